use anyhow::{Context, Result};
use database::SqliteStore;
use mcp_protocol::{ConfigCache, WorkItemServer};
use std::sync::Arc;
use tracing::info;
use work_item_core::store::Store;

use crate::config::Config;

/// Open (and migrate) the SQLite-backed store described by the configuration.
pub async fn create_store(config: &Config) -> Result<Arc<dyn Store>> {
    let database_url = config.database_url();
    info!(database_url = %database_url, "Opening work-item store");

    let store = SqliteStore::new(&database_url)
        .await
        .context("Failed to open SQLite store")?;

    info!("Running database migrations");
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(store))
}

/// Build the tool-dispatch server over an already-open store, loading the
/// `.workflow/` config cache from `CONFIG_DIR` (or the working directory).
pub fn create_server(store: Arc<dyn Store>) -> Result<WorkItemServer> {
    let config_cache = Arc::new(ConfigCache::load().context("Failed to load workflow config")?);
    Ok(WorkItemServer::new(store, config_cache))
}

/// Initialize the complete application: open the store, run migrations,
/// load workflow config, and assemble the MCP server.
pub async fn initialize_app(config: &Config) -> Result<WorkItemServer> {
    info!("Initializing application");

    let store = create_store(config)
        .await
        .context("Failed to create store")?;

    let server = create_server(store).context("Failed to create server")?;

    info!("Application initialized successfully");
    Ok(server)
}

/// Ensure the database file's parent directory exists using config.
pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

/// Ensure the parent directory of a bare path or `sqlite://`-prefixed URL exists.
pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    if database_url == ":memory:" {
        return Ok(());
    }
    let path_part = database_url.strip_prefix("sqlite://").unwrap_or(database_url);
    if let Some(parent) = std::path::Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating database directory: {}", parent.display());
            std::fs::create_dir_all(parent)
                .context("Failed to create database directory")?;
        }
    }
    Ok(())
}
