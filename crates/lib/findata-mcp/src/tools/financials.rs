use findata_core::control::{CompareCompaniesRequest, FinancialSummaryRequest};
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

/// Parameters for a multi-year financial summary.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FinancialSummaryParams {
    pub ticker: String,
    /// Number of latest fiscal years, 1 to 20. Defaults to 3.
    pub years: Option<i64>,
}

/// Parameters for comparing companies on one metric.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CompareCompaniesParams {
    /// Between 2 and 10 tickers.
    pub tickers: Vec<String>,
    /// One of `revenue`, `net_income`, `market_cap`, `operating_margin`, `net_margin`.
    pub metric: String,
    /// Fiscal year to compare. Defaults to each company's latest year.
    pub year: Option<i64>,
}

#[tool_router(router = tool_router_financials, vis = "pub")]
impl<S: RecordStore + 'static> FindataMcp<S> {
    #[tool(description = "Per-year revenue, net income, margins, and EPS for a company, with revenue and net income CAGR.")]
    async fn get_financial_summary(
        &self,
        Parameters(params): Parameters<FinancialSummaryParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        let request = FinancialSummaryRequest {
            ticker: params.ticker,
            years: params.years,
        };
        helpers::envelope_result(&self.control().get_financial_summary(&access, request).await)
    }

    #[tool(description = "Compare 2 to 10 companies on one metric and name the leader. Rate limited more strictly than other tools.")]
    async fn compare_companies(
        &self,
        Parameters(params): Parameters<CompareCompaniesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        let request = CompareCompaniesRequest {
            tickers: params.tickers,
            metric: params.metric,
            year: params.year,
        };
        helpers::envelope_result(&self.control().compare_companies(&access, request).await)
    }
}
