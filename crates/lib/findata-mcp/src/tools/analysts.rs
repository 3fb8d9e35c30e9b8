use findata_core::control::ListAnalystRatingsRequest;
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

use super::companies::TickerParams;
use crate::FindataMcp;
use crate::helpers;

/// Parameters for listing analyst ratings.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListAnalystRatingsParams {
    pub ticker: String,
    pub limit: Option<i64>,
    /// `next_cursor` from a previous `list_analyst_ratings` call.
    pub cursor: Option<String>,
}

#[tool_router(router = tool_router_analysts, vis = "pub")]
impl<S: RecordStore + 'static> FindataMcp<S> {
    #[tool(description = "Analyst consensus for a company: rating counts, average price target, and the latest ratings.")]
    async fn get_analyst_consensus(
        &self,
        Parameters(params): Parameters<TickerParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(
            &self
                .control()
                .get_analyst_consensus(&access, &params.ticker)
                .await,
        )
    }

    #[tool(description = "Analyst ratings for a company, newest first. Paged.")]
    async fn list_analyst_ratings(
        &self,
        Parameters(params): Parameters<ListAnalystRatingsParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        let request = ListAnalystRatingsRequest {
            ticker: params.ticker,
            limit: params.limit,
            cursor: params.cursor,
        };
        helpers::envelope_result(&self.control().list_analyst_ratings(&access, request).await)
    }
}
