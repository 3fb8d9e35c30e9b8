//! The `Record` trait that ties a row model to its table and sort keys.

use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Ownership;

/// A typed value of a sortable column.
///
/// Values of the same kind are totally ordered; keysets never compare values
/// across kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum SortValue {
    Int(i64),
    Text(String),
    Date(NaiveDate),
}

/// The kind tag of a [`SortValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKind {
    Int,
    Text,
    Date,
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Text => "text",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

impl SortValue {
    #[must_use]
    pub const fn kind(&self) -> SortKind {
        match self {
            Self::Int(_) => SortKind::Int,
            Self::Text(_) => SortKind::Text,
            Self::Date(_) => SortKind::Date,
        }
    }

    /// Converts the value into the JSON form rows are stored with.
    ///
    /// Dates are stored as ISO-8601 strings so lexical and chronological order
    /// agree inside the store.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::from(value.clone()),
            Self::Date(value) => Value::from(value.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SortValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SortValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<NaiveDate> for SortValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// A row type stored in a named table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Table the rows live in.
    const TABLE: &'static str;
    /// Column holding a unique, immutable row identifier used as tiebreaker.
    const UNIQUE_KEY: &'static str = crate::schema::COL_UID;
    /// How row ownership (and therefore visibility) is expressed.
    const OWNERSHIP: Ownership;

    /// Returns the value of a sortable column, or `None` if the column is not
    /// sortable for this record.
    fn sort_value(&self, field: &str) -> Option<SortValue>;

    /// Returns the kind of a sortable column, or `None` if the column is not
    /// sortable for this record.
    fn sort_kind(field: &str) -> Option<SortKind>;

    /// Unique identifier of this row.
    fn uid(&self) -> &str;
}
