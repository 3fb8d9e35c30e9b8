use std::borrow::Cow;

use axum::http::request::Parts;
use findata_core::{AccessContext, AccessInput, Role, ToolEnvelope};
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode, Extensions};
use serde::Serialize;

/// Header carrying the caller's user id, set by an upstream authenticator.
pub const HEADER_USER_ID: &str = "x-findata-user-id";
/// Header carrying the caller's role (`anonymous`, `user`, or `admin`).
pub const HEADER_ROLE: &str = "x-findata-role";

pub(crate) fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Serializes an envelope into a tool result; failed envelopes set `is_error`.
pub(crate) fn envelope_result<T: Serialize>(
    envelope: &ToolEnvelope<T>,
) -> Result<CallToolResult, ErrorData> {
    let content = vec![Content::json(envelope)?];
    if envelope.ok {
        Ok(CallToolResult::success(content))
    } else {
        Ok(CallToolResult::error(content))
    }
}

/// Reads the caller identity from the HTTP request parts rmcp attaches to a
/// request. Requests without identity headers run as `fallback`.
pub(crate) fn access_from_extensions(
    extensions: &Extensions,
    fallback: &AccessContext,
) -> Result<AccessContext, ErrorData> {
    extensions
        .get::<Parts>()
        .map_or_else(|| Ok(fallback.clone()), |parts| access_from_parts(parts, fallback))
}

fn access_from_parts(parts: &Parts, fallback: &AccessContext) -> Result<AccessContext, ErrorData> {
    let user_id = header_value(parts, HEADER_USER_ID)?;
    let role = header_value(parts, HEADER_ROLE)?;
    if user_id.is_none() && role.is_none() {
        return Ok(fallback.clone());
    }
    let role = match role {
        Some(role) => role
            .parse::<Role>()
            .map_err(|err| mcp_err(ErrorCode::INVALID_REQUEST, err.to_string()))?,
        None => Role::User,
    };
    AccessContext::from_input(AccessInput { user_id, role })
        .map_err(|err| mcp_err(ErrorCode::INVALID_REQUEST, err.to_string()))
}

fn header_value(parts: &Parts, name: &'static str) -> Result<Option<String>, ErrorData> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| mcp_err(ErrorCode::INVALID_REQUEST, format!("{name} is not valid text")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use findata_core::{CoreError, Meta, Role};

    use super::*;

    fn extensions_with(headers: &[(&str, &str)]) -> Extensions {
        let mut builder = Request::builder().uri("/mcp");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        let mut extensions = Extensions::new();
        extensions.insert(parts);
        extensions
    }

    #[test]
    fn missing_parts_use_the_fallback() {
        let fallback = AccessContext::user("stdio-user");
        let access = access_from_extensions(&Extensions::new(), &fallback).unwrap();
        assert_eq!(access, fallback);
    }

    #[test]
    fn requests_without_identity_headers_use_the_fallback() {
        let extensions = extensions_with(&[("content-type", "application/json")]);
        let access = access_from_extensions(&extensions, &AccessContext::anonymous()).unwrap();
        assert_eq!(access.role(), Role::Anonymous);
    }

    #[test]
    fn user_id_header_alone_means_user_role() {
        let extensions = extensions_with(&[(HEADER_USER_ID, "alice")]);
        let access = access_from_extensions(&extensions, &AccessContext::anonymous()).unwrap();
        assert_eq!(access, AccessContext::user("alice"));
    }

    #[test]
    fn admin_role_header_is_honoured() {
        let extensions = extensions_with(&[(HEADER_ROLE, "Admin"), (HEADER_USER_ID, "ops")]);
        let access = access_from_extensions(&extensions, &AccessContext::anonymous()).unwrap();
        assert!(access.is_admin());
        assert_eq!(access.user_id(), Some("ops"));
    }

    #[test]
    fn invalid_identity_headers_are_rejected() {
        let unknown_role = extensions_with(&[(HEADER_ROLE, "root")]);
        let err = access_from_extensions(&unknown_role, &AccessContext::anonymous()).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);

        let user_without_id = extensions_with(&[(HEADER_ROLE, "user")]);
        let err =
            access_from_extensions(&user_without_id, &AccessContext::anonymous()).unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_REQUEST);
    }

    #[test]
    fn failed_envelopes_become_error_results() {
        let meta = Meta {
            execution_ms: 0.5,
            row_count: None,
        };
        let ok = ToolEnvelope::success("help", "text".to_string(), meta.clone());
        assert_eq!(envelope_result(&ok).unwrap().is_error, Some(false));

        let failed: ToolEnvelope<String> =
            ToolEnvelope::failure("help", &CoreError::validation("bad"), meta);
        assert_eq!(envelope_result(&failed).unwrap().is_error, Some(true));
    }
}
