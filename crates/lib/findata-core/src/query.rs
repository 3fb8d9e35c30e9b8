//! Backend-neutral query model: predicates, total orders, and keysets.
//!
//! Column names are `&'static str` constants from `findata_store::schema`;
//! only values are ever taken from callers, and backends bind them as
//! parameters.

use findata_store::{Record, SortValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub direction: Direction,
}

/// Ordered list of sort keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    keys: Vec<SortKey>,
}

impl OrderBy {
    #[must_use]
    pub fn asc(field: &'static str) -> Self {
        Self {
            keys: vec![SortKey {
                field,
                direction: Direction::Asc,
            }],
        }
    }

    #[must_use]
    pub fn desc(field: &'static str) -> Self {
        Self {
            keys: vec![SortKey {
                field,
                direction: Direction::Desc,
            }],
        }
    }

    #[must_use]
    pub fn then_asc(mut self, field: &'static str) -> Self {
        self.keys.push(SortKey {
            field,
            direction: Direction::Asc,
        });
        self
    }

    #[must_use]
    pub fn then_desc(mut self, field: &'static str) -> Self {
        self.keys.push(SortKey {
            field,
            direction: Direction::Desc,
        });
        self
    }

    /// Makes the order total for `T` by appending its unique key as the final
    /// ascending tiebreaker when it is not already part of the order.
    #[must_use]
    pub fn total_for<T: Record>(self) -> Self {
        if self.keys.iter().any(|key| key.field == T::UNIQUE_KEY) {
            self
        } else {
            self.then_asc(T::UNIQUE_KEY)
        }
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
}

/// Boolean row filter understood by every store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    Never,
    Eq(&'static str, SortValue),
    IsNull(&'static str),
    Compare {
        field: &'static str,
        op: CompareOp,
        value: SortValue,
    },
    /// Case-insensitive substring match on a text column.
    ContainsInsensitive {
        field: &'static str,
        needle: String,
    },
    All(Vec<Self>),
    Any(Vec<Self>),
    /// Row's `foreign_key` references a row of `parent_table` (by
    /// `parent_key`) that satisfies `predicate`.
    InParent {
        foreign_key: &'static str,
        parent_table: &'static str,
        parent_key: &'static str,
        predicate: Box<Self>,
    },
}

impl Predicate {
    #[must_use]
    pub fn eq(field: &'static str, value: impl Into<SortValue>) -> Self {
        Self::Eq(field, value.into())
    }

    #[must_use]
    pub fn compare(field: &'static str, op: CompareOp, value: impl Into<SortValue>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn contains_insensitive(field: &'static str, needle: &str) -> Self {
        Self::ContainsInsensitive {
            field,
            needle: needle.to_lowercase(),
        }
    }

    /// Conjunction that drops `Always` terms and collapses to `Never` when any
    /// term is `Never`.
    #[must_use]
    pub fn all(terms: impl IntoIterator<Item = Self>) -> Self {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Self::Always => {}
                Self::Never => return Self::Never,
                Self::All(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::Always,
            1 => flat.pop().unwrap_or(Self::Always),
            _ => Self::All(flat),
        }
    }

    /// Disjunction that drops `Never` terms and collapses to `Always` when any
    /// term is `Always`.
    #[must_use]
    pub fn any(terms: impl IntoIterator<Item = Self>) -> Self {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Self::Never => {}
                Self::Always => return Self::Always,
                Self::Any(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::Never,
            1 => flat.pop().unwrap_or(Self::Never),
            _ => Self::Any(flat),
        }
    }
}

/// Values of the sort keys of one row, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyset {
    entries: Vec<(String, SortValue)>,
}

impl Keyset {
    #[must_use]
    pub const fn new(entries: Vec<(String, SortValue)>) -> Self {
        Self { entries }
    }

    /// Extracts the keyset of `row` under `order`. Returns `None` if the row
    /// does not expose one of the sort keys.
    #[must_use]
    pub fn of<T: Record>(row: &T, order: &OrderBy) -> Option<Self> {
        let entries = order
            .keys()
            .iter()
            .map(|key| {
                row.sort_value(key.field)
                    .map(|value| (key.field.to_string(), value))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, SortValue)] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&SortValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<(String, SortValue)> {
        self.entries
    }

    /// Builds the "strictly after this keyset" bound under `order`:
    /// `k1 > v1 OR (k1 = v1 AND k2 > v2) OR ...`, with `>` flipped to `<` for
    /// descending keys.
    ///
    /// The keyset must have been validated against `order`; keys are matched
    /// by position.
    #[must_use]
    pub fn after_predicate(&self, order: &OrderBy) -> Predicate {
        let mut branches = Vec::with_capacity(order.keys().len());
        for (index, key) in order.keys().iter().enumerate() {
            let Some((_, value)) = self.entries.get(index) else {
                break;
            };
            let mut terms: Vec<Predicate> = order.keys()[..index]
                .iter()
                .zip(&self.entries)
                .map(|(prior, (_, prior_value))| Predicate::Eq(prior.field, prior_value.clone()))
                .collect();
            let op = match key.direction {
                Direction::Asc => CompareOp::Gt,
                Direction::Desc => CompareOp::Lt,
            };
            terms.push(Predicate::compare(key.field, op, value.clone()));
            branches.push(Predicate::all(terms));
        }
        Predicate::any(branches)
    }
}

/// A store query that always carries a row bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedQuery {
    pub table: &'static str,
    pub predicate: Predicate,
    pub order: OrderBy,
    pub limit: usize,
}
