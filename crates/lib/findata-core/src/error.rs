//! Error taxonomy of the core.
//!
//! Every failure that can reach a caller maps to exactly one [`ErrorCode`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cursor::CursorError;
use crate::store::StoreError;

/// Stable, caller-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidCursor,
    RateLimitExceeded,
    NotFound,
    Forbidden,
    StoreError,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidCursor => "INVALID_CURSOR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::StoreError => "STORE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),
    #[error("rate limit exceeded for '{operation}'; retry after {retry_after_seconds}s")]
    RateLimited {
        operation: String,
        retry_after_seconds: u64,
    },
    /// The entity does not exist or is not visible to the caller. The two
    /// cases are deliberately indistinguishable.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::InvalidCursor(_) => ErrorCode::InvalidCursor,
            Self::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Store(_) => ErrorCode::StoreError,
        }
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Short remediation hint shown to the calling agent.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidCursor(_) => Some("Restart pagination without a cursor."),
            Self::NotFound { entity: "company", .. } => {
                Some("Check spelling or use search_companies to find valid tickers.")
            }
            Self::RateLimited { .. } => Some("Wait for retry_after seconds before calling again."),
            _ => None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
