//! streamable-HTTP transport
//!
//! Serves [`WorkItemServer`] at `POST /mcp` using `rmcp`'s own streamable-HTTP
//! service, so the wire framing (MCP spec 2025-03-26) is handled by the same
//! crate that implements the tool router rather than a bespoke JSON-RPC axum
//! router. `mcp_protocol::request_logger` wraps every call as a tracing span.

use anyhow::{Context, Result};
use axum::middleware;
use mcp_protocol::{request_logger::mcp_request_logging_middleware, WorkItemServer};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, tower::StreamableHttpService,
};
use std::sync::Arc;
use tracing::info;

pub async fn serve(server: WorkItemServer, bind_addr: &str) -> Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    );

    let app = axum::Router::new()
        .nest_service("/mcp", service)
        .layer(middleware::from_fn(mcp_request_logging_middleware));

    info!(addr = %bind_addr, "Starting MCP server in http mode");

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context("Failed to bind HTTP listener")?;

    axum::serve(listener, app)
        .await
        .context("HTTP server exited with an error")?;

    Ok(())
}
