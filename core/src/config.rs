//! Workflow and note-schema configuration: YAML types, loading, and the
//! `CONFIG_DIR` resolution the workflow engine and note-schema service both
//! depend on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkItemError};
use crate::models::Role;

const CONFIG_DIR_ENV: &str = "CONFIG_DIR";
const WORKFLOW_SUBDIR: &str = ".workflow";
const WORKFLOW_FILE: &str = "config.yaml";
const SCHEMAS_FILE: &str = "schemas.yaml";

const DEFAULT_WORKFLOW_YAML: &str = include_str!("../config/default_workflow.yaml");
const DEFAULT_SCHEMAS_YAML: &str = include_str!("../config/default_schemas.yaml");

/// Resolve the configuration directory: the `CONFIG_DIR` environment
/// variable if set, else the current working directory. Unlike
/// directory-walking discovery, this is a single provided-or-cwd check —
/// the spec does not ask for an upward search.
pub fn resolve_config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// A named flow: an ordered status sequence selected by tag match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowDef {
    pub name: String,
    #[serde(default, rename = "matchTags")]
    pub match_tags: Vec<String>,
    pub sequence: Vec<String>,
    pub terminal: Vec<String>,
    #[serde(default)]
    pub emergency: Vec<String>,
}

impl FlowDef {
    pub fn is_default(&self) -> bool {
        self.match_tags.is_empty()
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        !self.match_tags.is_empty()
            && self
                .match_tags
                .iter()
                .all(|t| tags.iter().any(|owned| owned == t))
    }

    pub fn position_of(&self, status: &str) -> Option<usize> {
        self.sequence.iter().position(|s| s == status)
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal.iter().any(|s| s == status)
    }

    pub fn first_terminal(&self) -> Option<&str> {
        self.terminal.first().map(String::as_str)
    }

    pub fn first_non_queue(&self, status_roles: &HashMap<String, Role>) -> Option<&str> {
        self.sequence
            .iter()
            .find(|s| status_roles.get(*s).map(|r| *r != Role::Queue).unwrap_or(false))
            .map(String::as_str)
    }
}

/// Auto-cascade configuration (`auto_cascade` key in `config.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoCascadeConfig {
    #[serde(default = "default_cascade_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_depth", rename = "maxDepth")]
    pub max_depth: u32,
}

fn default_cascade_enabled() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

impl Default for AutoCascadeConfig {
    fn default() -> Self {
        Self {
            enabled: default_cascade_enabled(),
            max_depth: default_max_depth(),
        }
    }
}

/// The full `.workflow/config.yaml` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    pub flows: Vec<FlowDef>,
    pub status_roles: HashMap<String, Role>,
    #[serde(default)]
    pub auto_cascade: AutoCascadeConfig,
}

impl WorkflowConfig {
    /// Load from `<config_dir>/.workflow/config.yaml`, falling back to the
    /// bundled default if the file is absent.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(WORKFLOW_SUBDIR).join(WORKFLOW_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                DEFAULT_WORKFLOW_YAML.to_string()
            }
            Err(e) => {
                return Err(WorkItemError::Configuration(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| WorkItemError::Configuration(format!("invalid workflow config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The bundled workflow definition, parsed fresh. Used wherever a
    /// `Store` needs a flow to resolve a new item's status/role against and
    /// no `.workflow/config.yaml` override has been loaded.
    pub fn default_bundled() -> Self {
        Self::from_yaml(DEFAULT_WORKFLOW_YAML).expect("bundled default_workflow.yaml is valid")
    }

    fn validate(&self) -> Result<()> {
        if self.flows.is_empty() {
            return Err(WorkItemError::Configuration(
                "workflow config must declare at least one flow".to_string(),
            ));
        }
        if !self.flows.iter().any(FlowDef::is_default) {
            return Err(WorkItemError::Configuration(
                "workflow config must declare a default flow (empty matchTags)".to_string(),
            ));
        }
        for flow in &self.flows {
            if flow.terminal.is_empty() {
                return Err(WorkItemError::Configuration(format!(
                    "flow '{}' has no terminal status",
                    flow.name
                )));
            }
            for status in flow.sequence.iter().chain(flow.terminal.iter()).chain(flow.emergency.iter()) {
                if !self.status_roles.contains_key(status) {
                    return Err(WorkItemError::Configuration(format!(
                        "status '{status}' in flow '{}' is missing from status_roles",
                        flow.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve the active flow for an item's tag set: most-specific
    /// non-empty `matchTags` subset wins, ties break by configuration
    /// order, falling back to the default flow.
    pub fn select_flow(&self, tags: &[String]) -> &FlowDef {
        self.flows
            .iter()
            .filter(|f| f.matches(tags))
            .max_by_key(|f| f.match_tags.len())
            .unwrap_or_else(|| {
                self.flows
                    .iter()
                    .find(|f| f.is_default())
                    .expect("validated: default flow always present")
            })
    }

    pub fn role_for_status(&self, status: &str) -> Result<Role> {
        self.status_roles
            .get(status)
            .copied()
            .ok_or_else(|| WorkItemError::Internal(format!("status '{status}' has no role mapping")))
    }

    /// Resolve a new item's initial `(status, role)` against its active
    /// flow: `requested` when given and a member of that flow's sequence/
    /// terminal/emergency statuses, else the flow's first sequence status.
    pub fn initial_status_and_role(&self, tags: &[String], requested: Option<&str>) -> Result<(String, Role)> {
        let flow = self.select_flow(tags);
        let status = match requested {
            Some(s) => {
                let known = flow.sequence.iter().chain(flow.terminal.iter()).chain(flow.emergency.iter());
                if !known.into_iter().any(|st| st == s) {
                    return Err(WorkItemError::Validation(format!(
                        "status '{s}' is not part of flow '{}'",
                        flow.name
                    )));
                }
                s.to_string()
            }
            None => flow
                .sequence
                .first()
                .cloned()
                .ok_or_else(|| WorkItemError::Configuration(format!("flow '{}' has an empty sequence", flow.name)))?,
        };
        let role = self.role_for_status(&status)?;
        Ok((status, role))
    }
}

/// A single required/optional note declaration within a schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteSchemaEntry {
    pub key: String,
    pub phase: Role,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// A tag-matched schema: `matchTags` must all be present on the item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteSchemaDef {
    #[serde(rename = "matchTags")]
    pub match_tags: Vec<String>,
    pub entries: Vec<NoteSchemaEntry>,
}

impl NoteSchemaDef {
    pub fn matches(&self, tags: &[String]) -> bool {
        self.match_tags
            .iter()
            .all(|t| tags.iter().any(|owned| owned == t))
    }
}

/// The full `.workflow/schemas.yaml` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NoteSchemaConfig {
    #[serde(default)]
    pub schemas: Vec<NoteSchemaDef>,
}

impl NoteSchemaConfig {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(WORKFLOW_SUBDIR).join(SCHEMAS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_SCHEMAS_YAML.to_string(),
            Err(e) => {
                return Err(WorkItemError::Configuration(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| WorkItemError::Configuration(format!("invalid note schema config: {e}")))
    }

    /// Merge entries from every matching schema, first-wins on key
    /// collision using configuration order.
    pub fn schema_for_tags(&self, tags: &[String]) -> Vec<NoteSchemaEntry> {
        let mut seen = std::collections::HashSet::new();
        let mut merged = Vec::new();
        for schema in self.schemas.iter().filter(|s| s.matches(tags)) {
            for entry in &schema.entries {
                if seen.insert(entry.key.clone()) {
                    merged.push(entry.clone());
                }
            }
        }
        merged
    }

    pub fn required_for_phase(&self, tags: &[String], phase: Role) -> Vec<NoteSchemaEntry> {
        self.schema_for_tags(tags)
            .into_iter()
            .filter(|e| e.required && e.phase == phase)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workflow() -> WorkflowConfig {
        WorkflowConfig::from_yaml(DEFAULT_WORKFLOW_YAML).unwrap()
    }

    #[test]
    fn default_bundled_workflow_config_is_valid() {
        let config = sample_workflow();
        assert!(config.flows.iter().any(FlowDef::is_default));
    }

    #[test]
    fn default_bundled_schema_config_parses() {
        let config = NoteSchemaConfig::from_yaml(DEFAULT_SCHEMAS_YAML).unwrap();
        assert!(!config.schemas.is_empty());
    }

    #[test]
    fn select_flow_prefers_most_specific_match() {
        let yaml = r#"
flows:
  - name: default
    sequence: [pending, active, done]
    terminal: [done]
  - name: impl-flow
    matchTags: [impl]
    sequence: [pending, coding, review, done]
    terminal: [done]
  - name: impl-backend-flow
    matchTags: [impl, backend]
    sequence: [pending, coding, review, done]
    terminal: [done]
status_roles:
  pending: queue
  active: work
  coding: work
  review: review
  done: terminal
"#;
        let config = WorkflowConfig::from_yaml(yaml).unwrap();
        let tags = vec!["impl".to_string(), "backend".to_string(), "extra".to_string()];
        let flow = config.select_flow(&tags);
        assert_eq!(flow.name, "impl-backend-flow");

        let generic_tags = vec!["docs".to_string()];
        let flow = config.select_flow(&generic_tags);
        assert_eq!(flow.name, "default");
    }

    #[test]
    fn validate_rejects_missing_default_flow() {
        let yaml = r#"
flows:
  - name: only-tagged
    matchTags: [impl]
    sequence: [pending, done]
    terminal: [done]
status_roles:
  pending: queue
  done: terminal
"#;
        assert!(WorkflowConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn validate_rejects_status_missing_role_mapping() {
        let yaml = r#"
flows:
  - name: default
    sequence: [pending, done]
    terminal: [done]
status_roles:
  pending: queue
"#;
        assert!(WorkflowConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn note_schema_merge_is_first_wins_on_key_collision() {
        let yaml = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
        description: first
  - matchTags: [impl, backend]
    entries:
      - key: design
        phase: work
        required: false
        description: second
      - key: test-plan
        phase: work
        required: true
"#;
        let config = NoteSchemaConfig::from_yaml(yaml).unwrap();
        let tags = vec!["impl".to_string(), "backend".to_string()];
        let merged = config.schema_for_tags(&tags);
        let design = merged.iter().find(|e| e.key == "design").unwrap();
        assert_eq!(design.description, "first");
        assert!(merged.iter().any(|e| e.key == "test-plan"));
    }

    #[test]
    fn required_for_phase_filters_by_required_and_phase() {
        let yaml = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
      - key: notes
        phase: queue
        required: false
"#;
        let config = NoteSchemaConfig::from_yaml(yaml).unwrap();
        let tags = vec!["impl".to_string()];
        let required = config.required_for_phase(&tags, Role::Queue);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].key, "design");
    }
}
