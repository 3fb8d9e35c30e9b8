//! Core of findata-mcp.
//!
//! This crate owns caller visibility, keyset pagination with opaque cursors,
//! sliding-window rate limiting, financial metrics, the named financial
//! operations, and the `SurrealDB` backing store implementation.

pub mod access;
pub mod control;
pub mod cursor;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod pagination;
pub mod query;
pub mod ratelimit;
pub mod services;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use access::{AccessContext, AccessInput, Role, Visibility};
pub use control::FindataControlPlane;
pub use envelope::{ErrorBody, Meta, Payload, ToolEnvelope};
pub use error::{CoreError, CoreResult, ErrorCode};
pub use guard::ToolInvocationGuard;
pub use pagination::{Page, PaginatedQueryExecutor, PaginationConfig};
pub use ratelimit::{RateLimit, RateLimitConfig, RateLimiter};
pub use services::{Session, SessionManager};
