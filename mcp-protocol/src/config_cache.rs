//! TTL-cached `WorkflowConfig`/`NoteSchemaConfig` loading. Agents should
//! never observe configuration more than `RELOAD_TTL` stale; a reload
//! failure keeps serving the last-good snapshot rather than erroring.

use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use work_item_core::{config::resolve_config_dir, NoteSchemaConfig, WorkflowConfig};

const RELOAD_TTL: Duration = Duration::from_secs(60);

struct Snapshot {
    workflow: WorkflowConfig,
    schemas: NoteSchemaConfig,
    loaded_at: Instant,
}

/// Read-mostly configuration cache shared by every tool call. Holds the
/// current config directory and the last-good snapshot; `get()` reloads
/// from disk when the TTL has elapsed, falling back to the stale snapshot
/// on a parse failure rather than failing the in-flight tool call.
pub struct ConfigCache {
    config_dir: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl ConfigCache {
    pub fn load() -> work_item_core::error::Result<Self> {
        let config_dir = resolve_config_dir();
        let workflow = WorkflowConfig::load(&config_dir)?;
        let schemas = NoteSchemaConfig::load(&config_dir)?;
        Ok(Self {
            config_dir,
            snapshot: RwLock::new(Snapshot { workflow, schemas, loaded_at: Instant::now() }),
        })
    }

    /// Return the current config pair, reloading from disk if the TTL has
    /// elapsed. A reload failure is logged and the previous snapshot is
    /// kept — config errors at runtime never fail an in-flight tool call.
    pub fn get(&self) -> (WorkflowConfig, NoteSchemaConfig) {
        let stale = {
            let guard = self.snapshot.read().unwrap();
            guard.loaded_at.elapsed() >= RELOAD_TTL
        };
        if stale {
            self.reload();
        }
        let guard = self.snapshot.read().unwrap();
        (guard.workflow.clone(), guard.schemas.clone())
    }

    /// Force an immediate reload regardless of TTL, used by the operational
    /// `get_context(health)` path to report a fresh snapshot age.
    pub fn reload(&self) {
        match (WorkflowConfig::load(&self.config_dir), NoteSchemaConfig::load(&self.config_dir)) {
            (Ok(workflow), Ok(schemas)) => {
                let mut guard = self.snapshot.write().unwrap();
                *guard = Snapshot { workflow, schemas, loaded_at: Instant::now() };
            }
            (workflow_result, schemas_result) => {
                tracing::warn!(
                    workflow_error = workflow_result.err().map(|e| e.to_string()),
                    schemas_error = schemas_result.err().map(|e| e.to_string()),
                    "config reload failed, keeping last-good snapshot"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_bundled_defaults_in_an_empty_dir() {
        let dir = std::env::temp_dir().join(format!("mcp-config-cache-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::env::set_var("CONFIG_DIR", &dir);
        let cache = ConfigCache::load().unwrap();
        let (workflow, _schemas) = cache.get();
        assert!(!workflow.flows.is_empty());
        std::env::remove_var("CONFIG_DIR");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
