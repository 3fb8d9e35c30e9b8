//! In-process store that evaluates predicates directly over JSON rows.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use findata_store::Record;
use serde_json::Value;

use super::{RecordStore, StoreError, StoreResult};
use crate::query::{BoundedQuery, CompareOp, Direction, Keyset, OrderBy, Predicate};

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<&'static str, Vec<Value>>>,
    fetches: Mutex<Vec<usize>>,
    ignored_deletes: Mutex<Vec<&'static str>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row limits of every fetch issued so far.
    pub fn fetch_limits(&self) -> Vec<usize> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes every later delete on `table` match nothing, as if a concurrent
    /// writer had already removed the rows.
    pub fn ignore_deletes(&self, table: &'static str) {
        self.ignored_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(table);
    }

    fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn matches(&self, row: &Value, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Always => true,
            Predicate::Never => false,
            Predicate::Eq(field, value) => {
                compare(row.get(*field), &value.to_json()) == Some(Ordering::Equal)
            }
            Predicate::IsNull(field) => row.get(*field).is_none_or(Value::is_null),
            Predicate::Compare { field, op, value } => {
                compare(row.get(*field), &value.to_json()).is_some_and(|ordering| match op {
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                })
            }
            Predicate::ContainsInsensitive { field, needle } => row
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str())),
            Predicate::All(terms) => terms.iter().all(|term| self.matches(row, term)),
            Predicate::Any(terms) => terms.iter().any(|term| self.matches(row, term)),
            Predicate::InParent {
                foreign_key,
                parent_table,
                parent_key,
                predicate,
            } => {
                let Some(reference) = row.get(*foreign_key) else {
                    return false;
                };
                self.rows(parent_table).iter().any(|parent| {
                    parent.get(*parent_key) == Some(reference) && self.matches(parent, predicate)
                })
            }
        }
    }
}

fn compare(left: Option<&Value>, right: &Value) -> Option<Ordering> {
    match (left?, right) {
        (Value::Number(a), Value::Number(b)) => a.as_i64()?.partial_cmp(&b.as_i64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn order_rows<T: Record>(rows: &mut [T], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let (Some(left), Some(right)) = (Keyset::of(a, order), Keyset::of(b, order)) else {
            return Ordering::Equal;
        };
        for (key, ((_, l), (_, r))) in order
            .keys()
            .iter()
            .zip(left.entries().iter().zip(right.entries()))
        {
            let ordering = match key.direction {
                Direction::Asc => l.cmp(r),
                Direction::Desc => r.cmp(l),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch<T: Record>(&self, query: BoundedQuery) -> StoreResult<Vec<T>> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.limit);
        let mut rows = self
            .rows(query.table)
            .into_iter()
            .filter(|row| self.matches(row, &query.predicate))
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        order_rows(&mut rows, &query.order);
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn insert<T: Record>(&self, row: T) -> StoreResult<T> {
        let value = serde_json::to_value(&row)?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(T::TABLE).or_default();
        if table
            .iter()
            .any(|existing| existing.get(T::UNIQUE_KEY) == value.get(T::UNIQUE_KEY))
        {
            return Err(StoreError::InvalidInput(format!(
                "duplicate {} in {}",
                T::UNIQUE_KEY,
                T::TABLE
            )));
        }
        table.push(value);
        Ok(row)
    }

    async fn update<T: Record>(&self, row: T, scope: Predicate) -> StoreResult<Option<T>> {
        let value = serde_json::to_value(&row)?;
        let predicate = Predicate::all([Predicate::eq(T::UNIQUE_KEY, row.uid()), scope]);
        let position = self
            .rows(T::TABLE)
            .iter()
            .position(|existing| self.matches(existing, &predicate));
        let Some(position) = position else {
            return Ok(None);
        };
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = tables
            .get_mut(T::TABLE)
            .and_then(|table| table.get_mut(position))
        {
            *slot = value;
        }
        Ok(Some(row))
    }

    async fn delete<T: Record>(&self, predicate: Predicate) -> StoreResult<usize> {
        if self
            .ignored_deletes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&T::TABLE)
        {
            return Ok(0);
        }
        let rows = self.rows(T::TABLE);
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .into_iter()
            .partition(|row| self.matches(row, &predicate));
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(T::TABLE, kept);
        Ok(removed.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
