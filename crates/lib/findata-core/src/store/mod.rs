//! Store interfaces and the `SurrealDB` implementation.
//!
//! Every read goes through [`RecordStore::fetch`], which only accepts a
//! [`BoundedQuery`]; there is no way to ask a store for an unbounded result.

#[cfg(test)]
pub(crate) mod memory;
pub mod surreal;

use std::time::Duration;

use async_trait::async_trait;
use findata_store::Record;
use thiserror::Error;

use crate::query::{BoundedQuery, Predicate};

pub use surreal::SurrealRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SurrealDB error: {0}")]
    Surreal(Box<surrealdb::Error>),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Surreal(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed row storage with backend-neutral predicates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns at most `query.limit` rows of `T` matching the predicate, in
    /// the query's order.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend query fails.
    async fn fetch<T: Record>(&self, query: BoundedQuery) -> StoreResult<Vec<T>>;

    /// Inserts a new row.
    ///
    /// # Errors
    /// Returns `StoreError` if the row already exists or the write fails.
    async fn insert<T: Record>(&self, row: T) -> StoreResult<T>;

    /// Replaces the row sharing `row.uid()` if it also satisfies `scope`.
    /// Returns `None` when no row matched.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails.
    async fn update<T: Record>(&self, row: T, scope: Predicate) -> StoreResult<Option<T>>;

    /// Deletes every row of `T` matching `predicate` and returns how many
    /// were removed.
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails.
    async fn delete<T: Record>(&self, predicate: Predicate) -> StoreResult<usize>;

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend is unavailable.
    async fn ping(&self) -> StoreResult<()>;
}

pub(crate) fn limit_to_i64(limit: usize) -> StoreResult<i64> {
    i64::try_from(limit)
        .map_err(|_| StoreError::InvalidInput("limit exceeds supported range".to_string()))
}
