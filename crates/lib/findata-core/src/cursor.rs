//! Opaque keyset pagination tokens.
//!
//! A token is URL-safe base64 (no padding) over a JSON payload:
//!
//! ```text
//! {"v":1,"op":"search_companies","keys":[["ticker",{"t":"text","v":"ALPH"}],...],"size":20,"sum":"<16 hex>"}
//! ```
//!
//! `sum` is a truncated SHA-256 of the remaining fields. It rejects tampering
//! and corruption; it is not a security boundary. Decoding validates the
//! operation tag and the keyset shape against the ordering it will be used
//! with, so a token can never yield a partially parsed or wrong-typed keyset.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use findata_store::{Record, SortKind, SortValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::query::{Keyset, OrderBy};

pub const CURSOR_VERSION: u8 = 1;
const MAX_TOKEN_LEN: usize = 4096;
const CHECKSUM_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor is empty or too long")]
    Length,
    #[error("cursor is not valid base64")]
    Encoding,
    #[error("cursor payload is malformed")]
    Malformed,
    #[error("unsupported cursor version {0}")]
    Version(u8),
    #[error("cursor checksum mismatch")]
    Checksum,
    #[error("cursor was issued for '{found}', not '{expected}'")]
    Operation { expected: String, found: String },
    #[error("cursor keyset does not match the ordering: {0}")]
    Shape(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorBody {
    v: u8,
    op: String,
    keys: Vec<(String, SortValue)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedCursor {
    #[serde(flatten)]
    body: CursorBody,
    sum: String,
}

/// A decoded, validated cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCursor {
    pub keyset: Keyset,
    /// Page size of the call that issued the cursor.
    pub page_size: Option<u32>,
}

/// Stateless encoder/decoder for pagination tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorCodec;

impl CursorCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encodes `keyset` as a token bound to `operation`.
    ///
    /// # Errors
    /// Returns the serializer error if the payload cannot be written as JSON.
    pub fn encode(
        &self,
        operation: &str,
        keyset: &Keyset,
        page_size: Option<u32>,
    ) -> Result<String, serde_json::Error> {
        let body = CursorBody {
            v: CURSOR_VERSION,
            op: operation.to_string(),
            keys: keyset.entries().to_vec(),
            size: page_size,
        };
        let sum = checksum(&body)?;
        let signed = SignedCursor { body, sum };
        let json = serde_json::to_vec(&signed)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes `token` for `operation`, validating it against the total order
    /// `order` over rows of type `T`.
    ///
    /// # Errors
    /// Returns `CursorError` if the token is malformed, tampered with, issued
    /// for another operation, or shaped for a different ordering.
    pub fn decode<T: Record>(
        &self,
        token: &str,
        operation: &str,
        order: &OrderBy,
    ) -> Result<DecodedCursor, CursorError> {
        let token = token.trim();
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(CursorError::Length);
        }
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CursorError::Encoding)?;
        let signed: SignedCursor =
            serde_json::from_slice(&raw).map_err(|_| CursorError::Malformed)?;
        let SignedCursor { body, sum } = signed;

        if body.v != CURSOR_VERSION {
            return Err(CursorError::Version(body.v));
        }
        if checksum(&body).map_err(|_| CursorError::Malformed)? != sum {
            return Err(CursorError::Checksum);
        }
        if body.op != operation {
            return Err(CursorError::Operation {
                expected: operation.to_string(),
                found: body.op,
            });
        }
        if body.size == Some(0) {
            return Err(CursorError::Malformed);
        }
        validate_shape::<T>(&body.keys, order)?;

        Ok(DecodedCursor {
            keyset: Keyset::new(body.keys),
            page_size: body.size,
        })
    }
}

fn validate_shape<T: Record>(
    keys: &[(String, SortValue)],
    order: &OrderBy,
) -> Result<(), CursorError> {
    if keys.len() != order.keys().len() {
        return Err(CursorError::Shape(format!(
            "expected {} keys, found {}",
            order.keys().len(),
            keys.len()
        )));
    }
    for ((field, value), key) in keys.iter().zip(order.keys()) {
        if field != key.field {
            return Err(CursorError::Shape(format!(
                "expected key '{}', found '{field}'",
                key.field
            )));
        }
        let expected: Option<SortKind> = T::sort_kind(key.field);
        if expected != Some(value.kind()) {
            return Err(CursorError::Shape(format!(
                "key '{field}' has kind {}",
                value.kind()
            )));
        }
    }
    Ok(())
}

fn checksum(body: &CursorBody) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(body)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest[..CHECKSUM_BYTES]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
