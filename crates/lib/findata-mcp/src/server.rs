//! Transports for the findata MCP server.
//!
//! stdio serves a single local caller under a fixed identity. Streamable HTTP
//! serves many callers at `/mcp` and resolves each one from identity headers;
//! `/health` answers load balancers with the store health envelope.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use findata_core::control::HealthReport;
use findata_core::store::RecordStore;
use findata_core::{AccessContext, FindataControlPlane, ToolEnvelope};
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::FindataMcp;

type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_HTTP_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4020);
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Listen address and session mode of the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTransport {
    pub addr: SocketAddr,
    /// Keep an MCP session per client; stateless mode answers each POST alone.
    pub stateful: bool,
}

impl HttpTransport {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful: true,
        }
    }

    #[must_use]
    pub const fn stateless(mut self) -> Self {
        self.stateful = false;
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }
}

/// Serves MCP over stdin/stdout until the client disconnects. Every call runs
/// as `access`.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<S: RecordStore + 'static>(
    control: Arc<FindataControlPlane<S>>,
    access: AccessContext,
) -> ServeResult {
    info!(role = %access.role(), "serving MCP over stdio");
    let running = serve_server(FindataMcp::with_control(control, access), stdio()).await?;
    running.waiting().await?;
    Ok(())
}

/// Serves MCP over streamable HTTP at `/mcp`. Calls without identity headers
/// run as `default_access`.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<S: RecordStore + 'static>(
    control: Arc<FindataControlPlane<S>>,
    default_access: AccessContext,
    transport: HttpTransport,
) -> ServeResult {
    let listener = tokio::net::TcpListener::bind(transport.addr).await?;
    info!(addr = %transport.addr, stateful = transport.stateful, "serving MCP over streamable HTTP");
    axum::serve(listener, router(control, default_access, transport)).await?;
    Ok(())
}

fn router<S: RecordStore + 'static>(
    control: Arc<FindataControlPlane<S>>,
    default_access: AccessContext,
    transport: HttpTransport,
) -> Router {
    let factory_control = control.clone();
    let mcp: StreamableHttpService<FindataMcp<S>, LocalSessionManager> = StreamableHttpService::new(
        move || {
            Ok(FindataMcp::with_control(
                factory_control.clone(),
                default_access.clone(),
            ))
        },
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            sse_keep_alive: Some(SSE_KEEP_ALIVE),
            stateful_mode: transport.stateful,
            ..Default::default()
        },
    );
    Router::new()
        .route("/health", get(health::<S>))
        .with_state(control)
        .nest_service("/mcp", mcp)
}

async fn health<S: RecordStore + 'static>(
    State(control): State<Arc<FindataControlPlane<S>>>,
) -> (StatusCode, Json<ToolEnvelope<HealthReport>>) {
    let envelope = control.health(&AccessContext::anonymous()).await;
    let status = if envelope.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(envelope))
}
