//! The named financial operations.
//!
//! Every public operation runs through the [`ToolInvocationGuard`] and
//! returns a [`ToolEnvelope`]; the `*_in` helpers hold the logic that runs
//! inside an acquired session.

use std::sync::Arc;

use findata_store::schema::{COL_TICKER, normalize_ticker};
use findata_store::{Company, Record};
use serde::Serialize;

use crate::access::AccessContext;
use crate::envelope::{Payload, ToolEnvelope};
use crate::error::{CoreError, CoreResult};
use crate::guard::ToolInvocationGuard;
use crate::pagination::PaginatedQueryExecutor;
use crate::query::{BoundedQuery, OrderBy, Predicate};
use crate::ratelimit::RateLimiter;
use crate::services::{Session, SessionManager};
use crate::store::RecordStore;

pub mod analysts;
pub mod companies;
pub mod financials;
pub mod market;

pub use analysts::{
    AnalystConsensus,
    AnalystRatingRow,
    ListAnalystRatingsRequest,
    RatingCount,
};
pub use companies::{
    CompanyBrief,
    CompanyProfile,
    CompanyUpsertRequest,
    DeleteOutcome,
    SearchCompaniesRequest,
};
pub use financials::{
    CompareCompaniesRequest,
    CompareMetric,
    Comparison,
    ComparisonRow,
    FinancialSummary,
    FinancialSummaryRequest,
    SummaryBasis,
    YearFinancials,
};
pub use market::{StockPriceHistory, StockPriceHistoryRequest, StockPriceRow};

pub const OP_SEARCH_COMPANIES: &str = "search_companies";
pub const OP_GET_COMPANY_PROFILE: &str = "get_company_profile";
pub const OP_GET_FINANCIAL_SUMMARY: &str = "get_financial_summary";
pub const OP_COMPARE_COMPANIES: &str = "compare_companies";
pub const OP_GET_STOCK_PRICE_HISTORY: &str = "get_stock_price_history";
pub const OP_GET_ANALYST_CONSENSUS: &str = "get_analyst_consensus";
pub const OP_LIST_ANALYST_RATINGS: &str = "list_analyst_ratings";
pub const OP_UPSERT_COMPANY: &str = "upsert_company";
pub const OP_DELETE_COMPANY: &str = "delete_company";
pub const OP_HEALTH: &str = "health";
pub const OP_HELP: &str = "help";

/// Operation names with one-line descriptions, in presentation order.
pub const OPERATIONS: &[(&str, &str)] = &[
    (OP_SEARCH_COMPANIES, "Search companies by ticker or name substring (paginated)."),
    (OP_GET_COMPANY_PROFILE, "Full profile of one company by ticker."),
    (OP_GET_FINANCIAL_SUMMARY, "Per-year revenue, net income, margins, EPS, and CAGR."),
    (OP_COMPARE_COMPANIES, "Compare 2-10 tickers on one metric and name a winner."),
    (OP_GET_STOCK_PRICE_HISTORY, "Daily OHLC bars with returns and max drawdown (paginated)."),
    (OP_GET_ANALYST_CONSENSUS, "Rating distribution, average price target, latest ratings."),
    (OP_LIST_ANALYST_RATINGS, "Analyst ratings, newest first (paginated)."),
    (OP_UPSERT_COMPANY, "Create or update a company owned by the caller."),
    (OP_DELETE_COMPANY, "Delete a company owned by the caller and its dependent rows."),
    (OP_HEALTH, "Store connectivity check."),
    (OP_HELP, "List the available operations."),
];

/// Upper bound on rows an aggregate operation reads for one company.
pub const AGGREGATE_ROW_CEILING: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
}

impl Payload for HealthReport {}

pub struct FindataControlPlane<S> {
    guard: ToolInvocationGuard<S>,
    executor: PaginatedQueryExecutor,
}

impl<S> Clone for FindataControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            executor: self.executor,
        }
    }
}

impl<S: RecordStore> FindataControlPlane<S> {
    #[must_use]
    pub const fn new(guard: ToolInvocationGuard<S>, executor: PaginatedQueryExecutor) -> Self {
        Self { guard, executor }
    }

    /// Builds a control plane with default pagination and a session pool of
    /// `max_sessions`.
    #[must_use]
    pub fn with_store(store: Arc<S>, limiter: RateLimiter, max_sessions: usize) -> Self {
        let sessions = SessionManager::new(store, max_sessions);
        Self::new(
            ToolInvocationGuard::new(limiter, sessions),
            PaginatedQueryExecutor::default(),
        )
    }

    #[must_use]
    pub const fn guard(&self) -> &ToolInvocationGuard<S> {
        &self.guard
    }

    #[must_use]
    pub const fn executor(&self) -> &PaginatedQueryExecutor {
        &self.executor
    }

    /// Checks that the store answers.
    pub async fn health(&self, access: &AccessContext) -> ToolEnvelope<HealthReport> {
        self.guard
            .invoke(OP_HEALTH, access, |session| async move {
                session.store().ping().await?;
                Ok(HealthReport {
                    status: "ok",
                    version: env!("CARGO_PKG_VERSION"),
                })
            })
            .await
    }

    /// Lists every operation with its description.
    pub async fn help(&self, access: &AccessContext) -> ToolEnvelope<String> {
        self.guard
            .invoke(OP_HELP, access, |_session| async { Ok(help_text()) })
            .await
    }

    /// Resolves a ticker to a company visible to the session.
    pub(crate) async fn resolve_company(
        &self,
        session: &Session<S>,
        ticker: &str,
    ) -> CoreResult<Company> {
        let ticker = required_ticker(ticker)?;
        self.executor
            .find_one::<Company, S>(session, Predicate::eq(COL_TICKER, ticker.as_str()))
            .await?
            .ok_or_else(|| CoreError::not_found("company", ticker))
    }

    /// Returns whether the row `uid` of `T` falls inside the session's write
    /// scope.
    pub(crate) async fn writable<T: Record>(&self, session: &Session<S>, uid: &str) -> CoreResult<bool> {
        let scope = session.access().write_scope(&T::OWNERSHIP).into_predicate();
        let rows: Vec<T> = session
            .store()
            .fetch(BoundedQuery {
                table: T::TABLE,
                predicate: Predicate::all([Predicate::eq(T::UNIQUE_KEY, uid), scope]),
                order: OrderBy::asc(T::UNIQUE_KEY),
                limit: 1,
            })
            .await?;
        Ok(!rows.is_empty())
    }
}

pub(crate) fn required_ticker(ticker: &str) -> CoreResult<String> {
    let ticker = normalize_ticker(ticker);
    if ticker.is_empty() {
        return Err(CoreError::validation("ticker is required"));
    }
    Ok(ticker)
}

#[must_use]
pub fn help_text() -> String {
    let mut text = String::from("Available operations:\n");
    for (name, description) in OPERATIONS {
        text.push_str("- ");
        text.push_str(name);
        text.push_str(": ");
        text.push_str(description);
        text.push('\n');
    }
    text
}
