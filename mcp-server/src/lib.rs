//! MCP Server Library
//!
//! Wires the hierarchical work-item core and its MCP protocol layer into a
//! runnable server: configuration loading, SQLite store setup, and the two
//! transports (`stdio`, `http`) named by the `TRANSPORT` environment
//! variable.

pub mod config;
pub mod http;
pub mod self_update;
pub mod setup;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use setup::{create_server, create_store, ensure_database_directory, initialize_app};
pub use telemetry::init_telemetry;
