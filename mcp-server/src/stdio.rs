//! stdio transport
//!
//! Serves [`WorkItemServer`] over line-delimited MCP frames on stdin/stdout
//! using `rmcp`'s own protocol implementation — the server-side mirror of
//! the `().serve(transport)` pattern rmcp's client examples use.

use anyhow::{Context, Result};
use mcp_protocol::WorkItemServer;
use rmcp::{service::ServiceExt, transport::io::stdio};
use tracing::info;

/// Run the server to completion: blocks until stdin closes or the peer
/// disconnects.
pub async fn serve(server: WorkItemServer) -> Result<()> {
    info!("Starting MCP server in stdio mode");

    let running = server
        .serve(stdio())
        .await
        .context("Failed to start stdio transport")?;

    running
        .waiting()
        .await
        .context("stdio transport exited with an error")?;

    info!("stdio transport closed, shutting down");
    Ok(())
}
