//! Builds a [`ToolDispatcher`] over a fresh in-process store and a
//! temporary `.workflow/` config directory, so scenarios run without a
//! database file or a spawned server process.

use std::sync::Arc;

use database::SqliteStore;
use mcp_protocol::{ConfigCache, ToolDispatcher};
use mocks::MockStore;
use tempfile::TempDir;

/// Holds the dispatcher under test plus the temp dir its config was loaded
/// from. The dir is never read again after `ConfigCache::load` snapshots
/// it, but it must outlive the dispatcher so nothing else reuses the path.
pub struct Fixture {
    pub dispatcher: ToolDispatcher,
    _config_dir: TempDir,
}

/// Build a dispatcher over an empty `MockStore`, using the bundled default
/// workflow and note-schema config (no `.workflow/` files written).
pub fn default_fixture() -> Fixture {
    build(None, None)
}

/// Build a dispatcher with an explicit `.workflow/config.yaml`, for
/// scenarios that need a non-default `auto_cascade.maxDepth` or a custom
/// flow/status map.
pub fn fixture_with_workflow(workflow_yaml: &str) -> Fixture {
    build(Some(workflow_yaml), None)
}

/// Build a dispatcher with an explicit `.workflow/schemas.yaml`, for
/// scenarios that need required notes gating a transition.
pub fn fixture_with_schemas(schemas_yaml: &str) -> Fixture {
    build(None, Some(schemas_yaml))
}

fn build(workflow_yaml: Option<&str>, schemas_yaml: Option<&str>) -> Fixture {
    let (config, dir) = load_config(workflow_yaml, schemas_yaml);
    let store = Arc::new(MockStore::new());
    Fixture { dispatcher: ToolDispatcher::new(store, config), _config_dir: dir }
}

/// Build a dispatcher over a real, migrated SQLite database (an on-disk
/// file inside the fixture's temp dir, not `:memory:`, since the store
/// opens a fresh pool connection per call and an in-memory database does
/// not survive across connections). Exercises the actual storage engine —
/// schema migrations, SQL-enforced uniqueness, foreign keys — in a path
/// `MockStore` never touches.
pub async fn sqlite_fixture() -> Fixture {
    let (config, dir) = load_config(None, None);
    let db_path = dir.path().join("work-items.sqlite3");
    let store = SqliteStore::new(&format!("sqlite://{}", db_path.display()))
        .await
        .expect("open sqlite store");
    store.migrate().await.expect("run migrations");
    Fixture { dispatcher: ToolDispatcher::new(Arc::new(store), config), _config_dir: dir }
}

fn load_config(
    workflow_yaml: Option<&str>,
    schemas_yaml: Option<&str>,
) -> (Arc<ConfigCache>, TempDir) {
    let dir = TempDir::new().expect("create temp config dir");
    let workflow_dir = dir.path().join(".workflow");
    std::fs::create_dir_all(&workflow_dir).expect("create .workflow dir");
    if let Some(yaml) = workflow_yaml {
        std::fs::write(workflow_dir.join("config.yaml"), yaml).expect("write config.yaml");
    }
    if let Some(yaml) = schemas_yaml {
        std::fs::write(workflow_dir.join("schemas.yaml"), yaml).expect("write schemas.yaml");
    }

    // ConfigCache::load() reads CONFIG_DIR itself; scenarios run
    // sequentially on one thread so this brief mutation is safe.
    std::env::set_var("CONFIG_DIR", dir.path());
    let config = Arc::new(ConfigCache::load().expect("load workflow/schema config"));
    std::env::remove_var("CONFIG_DIR");
    (config, dir)
}
