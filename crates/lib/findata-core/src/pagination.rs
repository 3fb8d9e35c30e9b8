//! Keyset pagination over any [`RecordStore`].
//!
//! A page is fetched as `limit + 1` rows under
//! `filter AND visibility AND after(cursor)`; the extra row only signals that
//! more rows exist. Because the bound is value-based, deleting the row a
//! cursor was issued from does not break the walk, and rows inserted past the
//! cursor position show up on later pages.

use findata_store::Record;
use serde::Serialize;
use tracing::debug;

use crate::cursor::CursorCodec;
use crate::error::{CoreError, CoreResult};
use crate::query::{BoundedQuery, Keyset, OrderBy, Predicate};
use crate::services::Session;
use crate::store::{RecordStore, StoreError};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub const fn with_default_limit(mut self, default_limit: u32) -> Self {
        self.default_limit = default_limit;
        self
    }

    #[must_use]
    pub const fn with_max_limit(mut self, max_limit: u32) -> Self {
        self.max_limit = max_limit;
        self
    }
}

/// One page request for a named operation.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub operation: &'static str,
    pub filter: Predicate,
    pub order: OrderBy,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

impl PageRequest {
    #[must_use]
    pub const fn new(operation: &'static str, order: OrderBy) -> Self {
        Self {
            operation,
            filter: Predicate::Always,
            order,
            cursor: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            has_more: self.has_more,
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaginatedQueryExecutor {
    config: PaginationConfig,
    codec: CursorCodec,
}

impl PaginatedQueryExecutor {
    #[must_use]
    pub const fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            codec: CursorCodec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> PaginationConfig {
        self.config
    }

    /// Effective page size: an explicit limit wins (clamped to the maximum),
    /// then the size carried by the cursor, then the default.
    ///
    /// # Errors
    /// Returns `CoreError::Validation` for a non-positive explicit limit.
    pub fn resolve_limit(&self, requested: Option<i64>, cursor_size: Option<u32>) -> CoreResult<u32> {
        let max = self.config.max_limit.max(1);
        match requested {
            Some(limit) if limit <= 0 => Err(CoreError::validation(format!(
                "limit must be a positive integer, got {limit}"
            ))),
            Some(limit) => Ok(u32::try_from(limit).unwrap_or(u32::MAX).min(max)),
            None => Ok(cursor_size.unwrap_or(self.config.default_limit).clamp(1, max)),
        }
    }

    /// Fetches one page of `T` visible to the session.
    ///
    /// # Errors
    /// Returns `CoreError` for an invalid limit or cursor, an unsortable
    /// order, or a store failure.
    pub async fn page<T, S>(&self, session: &Session<S>, request: PageRequest) -> CoreResult<Page<T>>
    where
        T: Record,
        S: RecordStore,
    {
        let PageRequest {
            operation,
            filter,
            order,
            cursor,
            limit,
        } = request;
        let order = checked_order::<T>(order)?;
        let decoded = cursor
            .as_deref()
            .map(|token| self.codec.decode::<T>(token, operation, &order))
            .transpose()?;
        let limit = self.resolve_limit(limit, decoded.as_ref().and_then(|d| d.page_size))?;
        let after = decoded
            .as_ref()
            .map_or(Predicate::Always, |d| d.keyset.after_predicate(&order));
        let predicate = Predicate::all([
            filter,
            session.access().visibility(&T::OWNERSHIP).into_predicate(),
            after,
        ]);

        let page_size = limit as usize;
        let mut items: Vec<T> = session
            .store()
            .fetch(BoundedQuery {
                table: T::TABLE,
                predicate,
                order: order.clone(),
                limit: page_size + 1,
            })
            .await?;
        let has_more = items.len() > page_size;
        items.truncate(page_size);

        let next_cursor = match items.last() {
            Some(last) if has_more => {
                let keyset = Keyset::of(last, &order).ok_or_else(missing_sort_key::<T>)?;
                Some(
                    self.codec
                        .encode(operation, &keyset, Some(limit))
                        .map_err(StoreError::from)?,
                )
            }
            _ => None,
        };
        debug!(
            operation,
            table = T::TABLE,
            limit,
            rows = items.len(),
            has_more,
            "page fetched"
        );
        Ok(Page {
            items,
            has_more,
            next_cursor,
        })
    }

    /// Walks every page matching `filter` for aggregate operations, stopping
    /// after `ceiling` rows. Each underlying fetch stays bounded by the
    /// maximum page size.
    ///
    /// # Errors
    /// Returns `CoreError` for an unsortable order or a store failure.
    pub async fn collect<T, S>(
        &self,
        session: &Session<S>,
        filter: Predicate,
        order: OrderBy,
        ceiling: usize,
    ) -> CoreResult<Vec<T>>
    where
        T: Record,
        S: RecordStore,
    {
        let order = checked_order::<T>(order)?;
        let visibility = session.access().visibility(&T::OWNERSHIP).into_predicate();
        let batch = self.config.max_limit.max(1) as usize;
        let mut rows: Vec<T> = Vec::new();
        let mut after = Predicate::Always;
        while rows.len() < ceiling {
            let limit = batch.min(ceiling - rows.len());
            let chunk: Vec<T> = session
                .store()
                .fetch(BoundedQuery {
                    table: T::TABLE,
                    predicate: Predicate::all([filter.clone(), visibility.clone(), after]),
                    order: order.clone(),
                    limit,
                })
                .await?;
            let exhausted = chunk.len() < limit;
            rows.extend(chunk);
            let Some(last) = rows.last() else {
                break;
            };
            if exhausted {
                break;
            }
            after = Keyset::of(last, &order)
                .ok_or_else(missing_sort_key::<T>)?
                .after_predicate(&order);
        }
        debug!(table = T::TABLE, rows = rows.len(), ceiling, "rows collected");
        Ok(rows)
    }

    /// Returns the first visible row matching `filter`, if any.
    ///
    /// # Errors
    /// Returns `CoreError` if the store query fails.
    pub async fn find_one<T, S>(&self, session: &Session<S>, filter: Predicate) -> CoreResult<Option<T>>
    where
        T: Record,
        S: RecordStore,
    {
        let predicate = Predicate::all([
            filter,
            session.access().visibility(&T::OWNERSHIP).into_predicate(),
        ]);
        let rows: Vec<T> = session
            .store()
            .fetch(BoundedQuery {
                table: T::TABLE,
                predicate,
                order: OrderBy::asc(T::UNIQUE_KEY),
                limit: 1,
            })
            .await?;
        Ok(rows.into_iter().next())
    }
}

fn checked_order<T: Record>(order: OrderBy) -> CoreResult<OrderBy> {
    let order = order.total_for::<T>();
    if let Some(key) = order
        .keys()
        .iter()
        .find(|key| T::sort_kind(key.field).is_none())
    {
        return Err(CoreError::validation(format!(
            "cannot order {} by '{}'",
            T::TABLE,
            key.field
        )));
    }
    Ok(order)
}

fn missing_sort_key<T: Record>() -> CoreError {
    CoreError::Store(StoreError::InvalidInput(format!(
        "{} row is missing a sort key",
        T::TABLE
    )))
}
