//! Daemon entry point for the findata MCP server.
//!
//! Loads configuration from the command line and environment, connects the
//! store, and serves the MCP protocol over stdio and/or streamable HTTP.

mod config;
mod database;

use std::sync::Arc;

use findata_core::{
    FindataControlPlane,
    PaginatedQueryExecutor,
    RateLimiter,
    SessionManager,
    ToolInvocationGuard,
};
use findata_mcp::server::{HttpTransport, serve_stdio, serve_streamable_http};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::FindataConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = FindataConfig::from_args()?;
    init_tracing(&config.log_level)?;

    let store = database::connect(&config).await?;
    let limiter = RateLimiter::new(config.rate_limit.clone());
    let _sweeper = limiter.clone().spawn_sweeper(config.rate_limit_sweep);

    let sessions = SessionManager::new(Arc::new(store), config.max_sessions);
    let guard = ToolInvocationGuard::new(limiter, sessions).with_call_timeout(config.call_timeout);
    let control = Arc::new(FindataControlPlane::new(
        guard,
        PaginatedQueryExecutor::new(config.pagination),
    ));
    info!(
        max_sessions = config.max_sessions,
        rate_limit_enabled = config.rate_limit.enabled,
        default_role = %config.default_access.role(),
        "control plane ready"
    );

    let http = HttpTransport::new(config.mcp_http_addr);
    match (config.enable_stdio, config.mcp_serve) {
        (true, true) => {
            let http_task = tokio::spawn(serve_streamable_http(
                control.clone(),
                config.default_access.clone(),
                http,
            ));
            serve_stdio(control, config.default_access).await?;
            http_task.abort();
        }
        (true, false) => serve_stdio(control, config.default_access).await?,
        (false, _) => {
            if let Err(err) = serve_streamable_http(control, config.default_access, http).await {
                error!(error = %err, "streamable HTTP server stopped");
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(log_level: &str) -> Result<(), BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;
    Ok(())
}
