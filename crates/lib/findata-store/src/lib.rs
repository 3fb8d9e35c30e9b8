//! Storage models and schema helpers for findata-mcp.
//!
//! This crate defines the canonical row model shared by the query layer, the
//! control plane, and storage backends, together with the ownership metadata
//! the access layer derives visibility predicates from.

pub mod models;
pub mod record;
pub mod schema;

pub use models::*;
pub use record::{Record, SortKind, SortValue};
pub use schema::Ownership;
