//! MCP server implementation for findata-mcp.
//!
//! This crate wires the financial control plane into rmcp tool handlers and
//! exposes the stdio and streamable HTTP transports.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use findata_core::store::RecordStore;
use findata_core::{AccessContext, FindataControlPlane};
use rmcp::{
    ErrorData,
    RoleServer,
    ServerHandler,
    handler::server::tool::ToolRouter,
    service::RequestContext,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, ServerCapabilities, ServerInfo};

pub use helpers::{HEADER_ROLE, HEADER_USER_ID};

const SERVER_INSTRUCTIONS: &str = r"findata-mcp answers questions about companies, their financial reports, daily stock prices, and analyst ratings.

Workflow:
1. Find a company with `search_companies` (substring of ticker or name). Tickers are case-insensitive.
2. Drill in with:
   - `get_company_profile` for descriptive fields.
   - `get_financial_summary` for per-year revenue, net income, margins, EPS, and CAGR.
   - `get_stock_price_history` for daily bars between two `YYYY-MM-DD` dates.
   - `get_analyst_consensus` and `list_analyst_ratings` for analyst coverage.
3. Rank companies with `compare_companies` on `revenue`, `net_income`, `market_cap`, `operating_margin`, or `net_margin`.
4. Maintain your own companies with `upsert_company` and `delete_company`.

Notes:
- Every tool returns an envelope `{ tool, ok, data, error, meta }`. Failures carry `error.code`:
  `VALIDATION_ERROR`, `INVALID_CURSOR`, `RATE_LIMIT_EXCEEDED` (see `retry_after`), `NOT_FOUND`, `FORBIDDEN`, `STORE_ERROR`.
- Paged tools return `has_more` and `next_cursor`. Pass `next_cursor` back unchanged with the same tool to continue.
  A cursor from one tool is rejected by another.
- `compare_companies` has a lower rate limit than the other tools.
- `help` lists every tool; `health` checks the store.";

/// MCP server wrapper around the control plane and tool routers.
pub struct FindataMcp<S> {
    tool_router: ToolRouter<Self>,
    control: Arc<FindataControlPlane<S>>,
    default_access: AccessContext,
}

impl<S> Clone for FindataMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: self.control.clone(),
            default_access: self.default_access.clone(),
        }
    }
}

impl<S: RecordStore + 'static> FindataMcp<S> {
    /// Creates a new server using a control plane by value.
    #[must_use]
    pub fn new(control: FindataControlPlane<S>, default_access: AccessContext) -> Self {
        Self::with_control(Arc::new(control), default_access)
    }

    /// Creates a new server using a shared control plane handle.
    ///
    /// `default_access` is used for calls that carry no identity headers,
    /// which includes every stdio call.
    #[must_use]
    pub fn with_control(
        control: Arc<FindataControlPlane<S>>,
        default_access: AccessContext,
    ) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_companies()
            + Self::tool_router_financials()
            + Self::tool_router_market()
            + Self::tool_router_analysts();
        Self {
            tool_router,
            control,
            default_access,
        }
    }

    #[must_use]
    pub fn control(&self) -> &FindataControlPlane<S> {
        &self.control
    }

    #[must_use]
    pub const fn default_access(&self) -> &AccessContext {
        &self.default_access
    }

    /// Resolves the caller of one request.
    pub(crate) fn access_for(
        &self,
        context: &RequestContext<RoleServer>,
    ) -> Result<AccessContext, ErrorData> {
        helpers::access_from_extensions(&context.extensions, &self.default_access)
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<S: RecordStore + 'static> FindataMcp<S> {
    #[tool(description = "Health check. Pings the backing store.")]
    async fn health(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(&self.control.health(&access).await)
    }

    #[tool(description = "List every tool with a short description.")]
    async fn help(&self, context: RequestContext<RoleServer>) -> Result<CallToolResult, ErrorData> {
        let access = self.access_for(&context)?;
        helpers::envelope_result(&self.control.help(&access).await)
    }
}

#[tool_handler]
impl<S: RecordStore + 'static> ServerHandler for FindataMcp<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
