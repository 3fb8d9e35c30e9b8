use findata_store::schema::{COL_COMPANY_UID, COL_NAME, COL_TICKER, COMPANY_OWNERSHIP};
use findata_store::{AnalystRating, Company, FinancialReport, Record, StockPrice};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    FindataControlPlane,
    OP_DELETE_COMPANY,
    OP_GET_COMPANY_PROFILE,
    OP_SEARCH_COMPANIES,
    OP_UPSERT_COMPANY,
    required_ticker,
};
use crate::access::{AccessContext, Role};
use crate::envelope::{Payload, ToolEnvelope};
use crate::error::{CoreError, CoreResult};
use crate::pagination::{Page, PageRequest};
use crate::query::{BoundedQuery, OrderBy, Predicate};
use crate::services::Session;
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCompaniesRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyBrief {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub market_cap: Option<f64>,
}

impl From<Company> for CompanyBrief {
    fn from(company: Company) -> Self {
        Self {
            ticker: company.ticker,
            name: company.name,
            sector: company.sector,
            market_cap: company.market_cap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub uid: String,
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: Option<f64>,
    pub employees: Option<i64>,
    pub description: Option<String>,
    pub ceo: Option<String>,
    pub founded_year: Option<i64>,
    pub country: String,
    pub currency: String,
    /// `true` when the row is visible to every caller.
    pub public: bool,
}

impl From<Company> for CompanyProfile {
    fn from(company: Company) -> Self {
        Self {
            public: company.owner_id.is_none(),
            uid: company.uid,
            ticker: company.ticker,
            name: company.name,
            sector: company.sector,
            industry: company.industry,
            market_cap: company.market_cap,
            employees: company.employees,
            description: company.description,
            ceo: company.ceo,
            founded_year: company.founded_year,
            country: company.country,
            currency: company.currency,
        }
    }
}

impl Payload for CompanyProfile {
    fn row_count(&self) -> Option<usize> {
        Some(1)
    }
}

/// Input payload for creating or updating a company.
///
/// Unset optional fields keep their stored value on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyUpsertRequest {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub employees: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ceo: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Create the row as public. Only admins may do this.
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub ticker: String,
    pub deleted: bool,
    /// Dependent financial, price, and rating rows removed with the company.
    pub dependent_rows: usize,
}

impl Payload for DeleteOutcome {
    fn row_count(&self) -> Option<usize> {
        Some(1 + self.dependent_rows)
    }
}

impl<S: RecordStore> FindataControlPlane<S> {
    /// Case-insensitive substring search over ticker and name, ordered by
    /// ticker.
    pub async fn search_companies(
        &self,
        access: &AccessContext,
        request: SearchCompaniesRequest,
    ) -> ToolEnvelope<Page<CompanyBrief>> {
        self.guard
            .invoke(OP_SEARCH_COMPANIES, access, |session| async move {
                self.search_companies_in(&session, request).await
            })
            .await
    }

    pub async fn get_company_profile(
        &self,
        access: &AccessContext,
        ticker: &str,
    ) -> ToolEnvelope<CompanyProfile> {
        self.guard
            .invoke(OP_GET_COMPANY_PROFILE, access, |session| async move {
                let company = self.resolve_company(&session, ticker).await?;
                Ok(CompanyProfile::from(company))
            })
            .await
    }

    /// Creates a company owned by the caller, or updates one the caller may
    /// write.
    pub async fn upsert_company(
        &self,
        access: &AccessContext,
        request: CompanyUpsertRequest,
    ) -> ToolEnvelope<CompanyProfile> {
        self.guard
            .invoke(OP_UPSERT_COMPANY, access, |session| async move {
                self.upsert_company_in(&session, request).await
            })
            .await
    }

    /// Deletes a company and its dependent rows.
    pub async fn delete_company(
        &self,
        access: &AccessContext,
        ticker: &str,
    ) -> ToolEnvelope<DeleteOutcome> {
        self.guard
            .invoke(OP_DELETE_COMPANY, access, |session| async move {
                self.delete_company_in(&session, ticker).await
            })
            .await
    }

    async fn search_companies_in(
        &self,
        session: &Session<S>,
        request: SearchCompaniesRequest,
    ) -> CoreResult<Page<CompanyBrief>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CoreError::validation("query must be a non-empty string"));
        }
        let filter = Predicate::any([
            Predicate::contains_insensitive(COL_TICKER, query),
            Predicate::contains_insensitive(COL_NAME, query),
        ]);
        let page = self
            .executor
            .page::<Company, S>(
                session,
                PageRequest::new(OP_SEARCH_COMPANIES, OrderBy::asc(COL_TICKER))
                    .with_filter(filter)
                    .with_cursor(request.cursor)
                    .with_limit(request.limit),
            )
            .await?;
        Ok(page.map(CompanyBrief::from))
    }

    async fn upsert_company_in(
        &self,
        session: &Session<S>,
        request: CompanyUpsertRequest,
    ) -> CoreResult<CompanyProfile> {
        let ticker = required_ticker(&request.ticker)?;
        let access = session.access();
        let existing = self
            .executor
            .find_one::<Company, S>(session, Predicate::eq(COL_TICKER, ticker.as_str()))
            .await?;

        if let Some(current) = existing {
            if !self.writable::<Company>(session, &current.uid).await? {
                return Err(CoreError::Forbidden(format!(
                    "company '{ticker}' is not writable by this caller"
                )));
            }
            let scope = access.write_scope(&COMPANY_OWNERSHIP).into_predicate();
            let updated = merge_company(current, request);
            let stored = session
                .store()
                .update(updated, scope)
                .await?
                .ok_or_else(|| {
                    CoreError::Forbidden(format!("company '{ticker}' is not writable by this caller"))
                })?;
            info!(ticker = %stored.ticker, caller = %access.caller_key(), "company updated");
            return Ok(CompanyProfile::from(stored));
        }

        let owner_id = new_row_owner(access, request.public)?;
        // Tickers are unique across owners; the clash is reported without
        // revealing whose row holds the ticker.
        let taken: Vec<Company> = session
            .store()
            .fetch(BoundedQuery {
                table: Company::TABLE,
                predicate: Predicate::eq(COL_TICKER, ticker.as_str()),
                order: OrderBy::asc(Company::UNIQUE_KEY),
                limit: 1,
            })
            .await?;
        if !taken.is_empty() {
            return Err(CoreError::validation(format!("ticker '{ticker}' is not available")));
        }

        let company = new_company(ticker, owner_id, request)?;
        let stored = session.store().insert(company).await?;
        info!(ticker = %stored.ticker, caller = %access.caller_key(), "company created");
        Ok(CompanyProfile::from(stored))
    }

    async fn delete_company_in(&self, session: &Session<S>, ticker: &str) -> CoreResult<DeleteOutcome> {
        let company = self.resolve_company(session, ticker).await?;
        if !self.writable::<Company>(session, &company.uid).await? {
            return Err(CoreError::Forbidden(format!(
                "company '{}' is not writable by this caller",
                company.ticker
            )));
        }
        let store = session.store();
        let scope = session
            .access()
            .write_scope(&COMPANY_OWNERSHIP)
            .into_predicate();
        let removed = store
            .delete::<Company>(Predicate::all([
                Predicate::eq(Company::UNIQUE_KEY, company.uid.as_str()),
                scope,
            ]))
            .await?;
        // The row went away (or changed owner) after the write check.
        if removed == 0 {
            return Err(CoreError::not_found("company", company.ticker));
        }

        // Orphaned dependents are hidden by the parent visibility predicate.
        let dependents = Predicate::eq(COL_COMPANY_UID, company.uid.as_str());
        let mut dependent_rows = store.delete::<FinancialReport>(dependents.clone()).await?;
        dependent_rows += store.delete::<StockPrice>(dependents.clone()).await?;
        dependent_rows += store.delete::<AnalystRating>(dependents).await?;
        info!(
            ticker = %company.ticker,
            caller = %session.access().caller_key(),
            dependent_rows,
            "company deleted"
        );
        Ok(DeleteOutcome {
            ticker: company.ticker,
            deleted: true,
            dependent_rows,
        })
    }
}

/// Owner column of a row created by `access`.
fn new_row_owner(access: &AccessContext, public: bool) -> CoreResult<Option<String>> {
    match access.role() {
        Role::Anonymous => Err(CoreError::Forbidden(
            "anonymous callers cannot create companies".to_string(),
        )),
        Role::User if public => Err(CoreError::Forbidden(
            "only admins can create public companies".to_string(),
        )),
        Role::User => Ok(access.user_id().map(str::to_string)),
        Role::Admin if public => Ok(None),
        Role::Admin => Ok(access.user_id().map(str::to_string)),
    }
}

fn required_text(value: Option<String>, field: &str) -> CoreResult<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| CoreError::validation(format!("{field} is required")))
}

fn new_company(
    ticker: String,
    owner_id: Option<String>,
    request: CompanyUpsertRequest,
) -> CoreResult<Company> {
    Ok(Company {
        uid: Uuid::new_v4().to_string(),
        ticker,
        name: required_text(request.name, "name")?,
        sector: required_text(request.sector, "sector")?,
        industry: required_text(request.industry, "industry")?,
        market_cap: request.market_cap,
        employees: request.employees,
        description: request.description,
        ceo: request.ceo,
        founded_year: request.founded_year,
        country: request.country.unwrap_or_else(|| "US".to_string()),
        currency: request.currency.unwrap_or_else(|| "USD".to_string()),
        owner_id,
    })
}

fn merge_company(mut company: Company, request: CompanyUpsertRequest) -> Company {
    fn set<T>(target: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *target = value;
        }
    }
    fn set_optional<T>(target: &mut Option<T>, value: Option<T>) {
        if value.is_some() {
            *target = value;
        }
    }

    set(&mut company.name, request.name);
    set(&mut company.sector, request.sector);
    set(&mut company.industry, request.industry);
    set(&mut company.country, request.country);
    set(&mut company.currency, request.currency);
    set_optional(&mut company.market_cap, request.market_cap);
    set_optional(&mut company.employees, request.employees);
    set_optional(&mut company.description, request.description);
    set_optional(&mut company.ceo, request.ceo);
    set_optional(&mut company.founded_year, request.founded_year);
    company
}
