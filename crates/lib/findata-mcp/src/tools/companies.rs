use findata_core::control::{CompanyUpsertRequest, SearchCompaniesRequest};
use findata_core::store::RecordStore;
use rmcp::{
    ErrorData,
    RoleServer,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    service::RequestContext,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::FindataMcp;
use crate::helpers;

/// Parameters for searching companies.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchCompaniesParams {
    /// Case-insensitive substring of the ticker or company name.
    pub query: String,
    pub limit: Option<i64>,
    /// `next_cursor` from a previous `search_companies` call.
    pub cursor: Option<String>,
}

/// Parameters for tools keyed by a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TickerParams {
    pub ticker: String,
}

/// Parameters for creating or updating a company.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UpsertCompanyParams {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub employees: Option<i64>,
    pub description: Option<String>,
    pub ceo: Option<String>,
    pub founded_year: Option<i64>,
    pub country: Option<String>,
    pub currency: Option<String>,
    /// Create the company as public. Admin only.
    #[serde(default)]
    pub public: bool,
}

impl From<UpsertCompanyParams> for CompanyUpsertRequest {
    fn from(params: UpsertCompanyParams) -> Self {
        Self {
            ticker: params.ticker,
            name: params.name,
            sector: params.sector,
            industry: params.industry,
            market_cap: params.market_cap,
            employees: params.employees,
            description: params.description,
            ceo: params.ceo,
            founded_year: params.founded_year,
            country: params.country,
            currency: params.currency,
            public: params.public,
        }
    }
}

#[tool_router(router = tool_router_companies, vis = "pub")]
impl<S: RecordStore + 'static> FindataMcp<S> {
    #[tool(description = "Search companies by ticker or name substring. Paged; ordered by ticker.")]
    async fn search_companies(
        &self,
        Parameters(params): Parameters<SearchCompaniesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        let request = SearchCompaniesRequest {
            query: params.query,
            limit: params.limit,
            cursor: params.cursor,
        };
        helpers::envelope_result(&self.control().search_companies(&access, request).await)
    }

    #[tool(description = "Fetch the profile of a company by ticker.")]
    async fn get_company_profile(
        &self,
        Parameters(params): Parameters<TickerParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(
            &self
                .control()
                .get_company_profile(&access, &params.ticker)
                .await,
        )
    }

    #[tool(description = "Create a company owned by the caller, or update one the caller owns. Unset fields keep their value.")]
    async fn upsert_company(
        &self,
        Parameters(params): Parameters<UpsertCompanyParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(&self.control().upsert_company(&access, params.into()).await)
    }

    #[tool(description = "Delete a company the caller owns, with its reports, prices, and ratings.")]
    async fn delete_company(
        &self,
        Parameters(params): Parameters<TickerParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(&self.control().delete_company(&access, &params.ticker).await)
    }
}
