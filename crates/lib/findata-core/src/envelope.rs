//! The result envelope every named operation returns.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ErrorCode};
use crate::pagination::Page;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            retry_after: err.retry_after(),
            hint: err.hint().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub execution_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
}

/// Either `data` or `error` is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope<T> {
    pub tool: String,
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

impl<T> ToolEnvelope<T> {
    #[must_use]
    pub fn success(tool: &str, data: T, meta: Meta) -> Self {
        Self {
            tool: tool.to_string(),
            ok: true,
            data: Some(data),
            error: None,
            meta,
        }
    }

    #[must_use]
    pub fn failure(tool: &str, err: &CoreError, meta: Meta) -> Self {
        Self {
            tool: tool.to_string(),
            ok: false,
            data: None,
            error: Some(ErrorBody::from(err)),
            meta,
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> Option<ErrorCode> {
        match &self.error {
            Some(body) => Some(body.code),
            None => None,
        }
    }
}

/// Data that can report how many rows it carries.
pub trait Payload: Serialize {
    fn row_count(&self) -> Option<usize> {
        None
    }
}

impl<T: Serialize> Payload for Page<T> {
    fn row_count(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

impl<T: Serialize> Payload for Vec<T> {
    fn row_count(&self) -> Option<usize> {
        Some(self.len())
    }
}

impl Payload for String {}

impl Payload for serde_json::Value {}
