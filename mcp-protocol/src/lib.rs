//! MCP Protocol Implementation
//!
//! This crate bridges the work-item core's business logic to Model Context
//! Protocol clients. It provides:
//!
//! - The 13-tool request/response shapes ([`params`]) and the uniform
//!   response envelope ([`response`])
//! - Request validation and error-code mapping ([`validate`], [`error`])
//! - A TTL-based cache over the workflow and note-schema YAML configs
//!   ([`config_cache`])
//! - [`dispatcher::ToolDispatcher`], which implements the 13 operations
//!   against a `work_item_core::store::Store`
//! - [`rmcp_server::WorkItemServer`], the thin `rmcp` wiring that exposes
//!   those operations as named tools
//! - [`request_logger`], a tracing-based access log for the HTTP transport
//!
//! # Usage
//!
//! ```no_run
//! use mcp_protocol::{config_cache::ConfigCache, rmcp_server::WorkItemServer};
//! use std::sync::Arc;
//!
//! async fn start_server(
//!     store: Arc<dyn work_item_core::store::Store>,
//! ) -> anyhow::Result<()> {
//!     let config = Arc::new(ConfigCache::load()?);
//!     let _server = WorkItemServer::new(store, config);
//!     // wire `_server` into an rmcp transport (stdio or streamable-HTTP)
//!     Ok(())
//! }
//! ```

pub mod config_cache;
pub mod dispatcher;
pub mod error;
pub mod params;
pub mod request_logger;
pub mod response;
pub mod rmcp_server;
pub mod validate;

pub use config_cache::ConfigCache;
pub use dispatcher::ToolDispatcher;
pub use error::{map_error, ToolError};
pub use rmcp_server::WorkItemServer;
