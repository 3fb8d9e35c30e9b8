use std::sync::Arc;

use async_trait::async_trait;
use findata_store::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;
use surrealdb::{Connection, Surreal};

use super::{RecordStore, StoreError, StoreResult, limit_to_i64};
use crate::query::{BoundedQuery, CompareOp, Direction, OrderBy, Predicate};

const SCHEMA: &str = "
DEFINE INDEX IF NOT EXISTS company_uid ON TABLE company FIELDS uid UNIQUE;
DEFINE INDEX IF NOT EXISTS company_ticker ON TABLE company FIELDS ticker UNIQUE;
DEFINE INDEX IF NOT EXISTS company_owner ON TABLE company FIELDS owner_id;
DEFINE INDEX IF NOT EXISTS financial_company_period ON TABLE financial FIELDS company_uid, period_year, period_quarter;
DEFINE INDEX IF NOT EXISTS stock_price_company_date ON TABLE stock_price FIELDS company_uid, date;
DEFINE INDEX IF NOT EXISTS analyst_rating_company_date ON TABLE analyst_rating FIELDS company_uid, rating_date;
";

pub struct SurrealRecordStore<C: Connection> {
    db: Arc<Surreal<C>>,
}

impl<C: Connection> Clone for SurrealRecordStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealRecordStore<C> {
    #[must_use]
    pub fn new(db: Surreal<C>) -> Self {
        Self { db: Arc::new(db) }
    }

    #[must_use]
    pub const fn from_arc(db: Arc<Surreal<C>>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &Surreal<C> {
        &self.db
    }

    /// Defines the lookup and uniqueness indexes the named operations rely on.
    ///
    /// # Errors
    /// Returns `StoreError` if any definition fails.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.db.query(SCHEMA).await?.check()?;
        Ok(())
    }

    async fn run<T: DeserializeOwned>(&self, statement: Statement) -> StoreResult<Vec<T>> {
        let Statement { sql, params } = statement;
        let mut query = self.db.query(sql);
        for param in params {
            query = query.bind(param);
        }
        let mut response = query.await?;
        let records: Vec<T> = response.take(0)?;
        Ok(records)
    }
}

#[async_trait]
impl<C: Connection> RecordStore for SurrealRecordStore<C> {
    async fn fetch<T: Record>(&self, query: BoundedQuery) -> StoreResult<Vec<T>> {
        let statement = Statement::select(&query)?;
        self.run(statement).await
    }

    async fn insert<T: Record>(&self, row: T) -> StoreResult<T> {
        ensure_non_empty(row.uid(), T::UNIQUE_KEY)?;
        let uid = row.uid().to_string();
        let content = serde_json::to_value(&row)?;
        let record: Option<T> = self.db.create((T::TABLE, uid)).content(content).await?;
        require_record(record, T::TABLE)
    }

    async fn update<T: Record>(&self, row: T, scope: Predicate) -> StoreResult<Option<T>> {
        ensure_non_empty(row.uid(), T::UNIQUE_KEY)?;
        let predicate = Predicate::all([Predicate::eq(T::UNIQUE_KEY, row.uid()), scope]);
        let mut statement = Statement::default();
        let content = statement.bind(serde_json::to_value(&row)?);
        let condition = statement.condition(&predicate);
        statement.sql = format!(
            "UPDATE {table} MERGE {content} WHERE {condition} RETURN AFTER;",
            table = T::TABLE
        );
        let records: Vec<T> = self.run(statement).await?;
        Ok(records.into_iter().next())
    }

    async fn delete<T: Record>(&self, predicate: Predicate) -> StoreResult<usize> {
        let mut statement = Statement::default();
        let condition = statement.condition(&predicate);
        statement.sql = format!(
            "DELETE {table} WHERE {condition} RETURN BEFORE;",
            table = T::TABLE
        );
        let records: Vec<T> = self.run(statement).await?;
        Ok(records.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.health().await?;
        Ok(())
    }
}

/// SurrealQL text plus its positional parameters (`$p0`, `$p1`, ...).
#[derive(Debug, Default)]
struct Statement {
    sql: String,
    params: Vec<(String, Value)>,
}

impl Statement {
    fn select(query: &BoundedQuery) -> StoreResult<Self> {
        let mut statement = Self::default();
        let condition = statement.condition(&query.predicate);
        let order = render_order(&query.order);
        let limit = statement.bind(Value::from(limit_to_i64(query.limit)?));
        statement.sql = format!(
            "SELECT * FROM {table} WHERE {condition} ORDER BY {order} LIMIT {limit};",
            table = query.table
        );
        Ok(statement)
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = format!("${name}");
        self.params.push((name, value));
        placeholder
    }

    fn condition(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Always => "true".to_string(),
            Predicate::Never => "false".to_string(),
            Predicate::Eq(field, value) => {
                let param = self.bind(value.to_json());
                format!("{field} = {param}")
            }
            Predicate::IsNull(field) => format!("({field} = NONE OR {field} = NULL)"),
            Predicate::Compare { field, op, value } => {
                let param = self.bind(value.to_json());
                format!("{field} {} {param}", compare_symbol(*op))
            }
            Predicate::ContainsInsensitive { field, needle } => {
                let param = self.bind(Value::from(needle.clone()));
                format!("string::lowercase({field} ?? '') CONTAINS {param}")
            }
            Predicate::All(terms) => self.join(terms, " AND ", "true"),
            Predicate::Any(terms) => self.join(terms, " OR ", "false"),
            Predicate::InParent {
                foreign_key,
                parent_table,
                parent_key,
                predicate,
            } => {
                let inner = self.condition(predicate);
                format!(
                    "{foreign_key} IN (SELECT VALUE {parent_key} FROM {parent_table} WHERE {inner})"
                )
            }
        }
    }

    fn join(&mut self, terms: &[Predicate], separator: &str, empty: &str) -> String {
        if terms.is_empty() {
            return empty.to_string();
        }
        let rendered: Vec<String> = terms.iter().map(|term| self.condition(term)).collect();
        format!("({})", rendered.join(separator))
    }
}

const fn compare_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
    }
}

fn render_order(order: &OrderBy) -> String {
    order
        .keys()
        .iter()
        .map(|key| {
            let direction = match key.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {direction}", key.field)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn ensure_non_empty(value: &str, field: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn require_record<T>(record: Option<T>, table: &str) -> StoreResult<T> {
    record.ok_or_else(|| {
        StoreError::InvalidInput(format!("No record returned when creating {table}"))
    })
}
