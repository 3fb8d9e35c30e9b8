use findata_core::control::StockPriceHistoryRequest;
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

/// Parameters for a stock price history page.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StockPriceHistoryParams {
    pub ticker: String,
    /// Inclusive start date, `YYYY-MM-DD`.
    pub start_date: String,
    /// Inclusive end date, `YYYY-MM-DD`.
    pub end_date: String,
    pub limit: Option<i64>,
    /// `next_cursor` from a previous `get_stock_price_history` call.
    pub cursor: Option<String>,
}

#[tool_router(router = tool_router_market, vis = "pub")]
impl<S: RecordStore + 'static> FindataMcp<S> {
    #[tool(description = "Daily OHLC prices between two dates, oldest first, with daily returns, total return, and max drawdown over the page.")]
    async fn get_stock_price_history(
        &self,
        Parameters(params): Parameters<StockPriceHistoryParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        let request = StockPriceHistoryRequest {
            ticker: params.ticker,
            start_date: params.start_date,
            end_date: params.end_date,
            limit: params.limit,
            cursor: params.cursor,
        };
        helpers::envelope_result(
            &self
                .control()
                .get_stock_price_history(&access, request)
                .await,
        )
    }
}
