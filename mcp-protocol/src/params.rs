//! Request parameter types for the 13 exposed tools. Each tool takes a
//! single JSON object; batch-capable tools accept either a singular field
//! (`item`, `transition`) or its plural array form (`items`, `transitions`)
//! — never both populated at once is not enforced here, the dispatcher
//! simply prefers the plural form when present.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------
// manage_items / query_items
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageItemsParams {
    #[schemars(description = "One of: create, update, delete")]
    pub operation: String,
    #[schemars(description = "Single item payload for a non-batch call")]
    #[serde(default)]
    pub item: Option<Value>,
    #[schemars(description = "Array of item payloads for a batch call")]
    #[serde(default)]
    pub items: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryItemsParams {
    #[schemars(description = "One of: get, search, overview")]
    pub operation: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default, rename = "includeAncestors")]
    pub include_ancestors: bool,
    #[serde(default, rename = "includeChildren")]
    pub include_children: bool,
}

// ---------------------------------------------------------------------
// manage_notes / query_notes
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageNotesParams {
    #[schemars(description = "One of: upsert, delete")]
    pub operation: String,
    pub item_id: i64,
    pub key: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryNotesParams {
    pub item_id: i64,
}

// ---------------------------------------------------------------------
// manage_dependencies / query_dependencies
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageDependenciesParams {
    #[schemars(description = "One of: create, delete")]
    pub operation: String,
    #[schemars(description = "Explicit dependency edges: [{fromItemId, toItemId, type}]")]
    #[serde(default)]
    pub dependencies: Option<Vec<Value>>,
    #[schemars(description = "Shortcut pattern: linear, fan-out, or fan-in")]
    #[serde(default)]
    pub pattern: Option<String>,
    #[schemars(description = "Item ids for the shortcut pattern (linear order, or hub-then-spokes)")]
    #[serde(default)]
    pub item_ids: Option<Vec<i64>>,
    #[schemars(description = "Dependency type applied to every edge of a shortcut pattern")]
    #[serde(default)]
    pub dep_type: Option<String>,
    #[schemars(description = "Dependency id to delete")]
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryDependenciesParams {
    pub item_id: i64,
    #[schemars(description = "outgoing or incoming, default outgoing")]
    #[serde(default)]
    pub direction: Option<String>,
    #[schemars(description = "Default true: direct edges only. False: full BFS chain.")]
    #[serde(default = "default_true", rename = "neighborsOnly")]
    pub neighbors_only: bool,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

// ---------------------------------------------------------------------
// advance_item
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransitionRequest {
    pub item_id: i64,
    pub trigger: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdvanceItemParams {
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[schemars(description = "Batch form: an ordered list of transitions, not atomic across items")]
    #[serde(default)]
    pub transitions: Option<Vec<TransitionRequest>>,
}

// ---------------------------------------------------------------------
// get_next_status
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextStatusParams {
    pub item_id: i64,
    #[schemars(description = "What-if: evaluate as though the item had this status")]
    #[serde(default)]
    pub hypothetical_status: Option<String>,
    #[schemars(description = "What-if: evaluate as though the item had these tags")]
    #[serde(default)]
    pub hypothetical_tags: Option<Vec<String>>,
}

// ---------------------------------------------------------------------
// get_context
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetContextParams {
    #[schemars(description = "One of: item, session, health")]
    pub mode: String,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[schemars(description = "session mode: items transitioned at or after this RFC3339 timestamp")]
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default, rename = "includeAncestors")]
    pub include_ancestors: bool,
}

// ---------------------------------------------------------------------
// get_next_item / get_blocked_items
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextItemParams {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetBlockedItemsParams {
    #[serde(default)]
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------
// create_work_tree / complete_tree
// ---------------------------------------------------------------------

/// One node of a work tree to create. `key` is a caller-chosen local
/// identifier used only to wire up `dependencies` within the same call —
/// it is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkTreeNode {
    #[serde(default)]
    pub key: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Vec<WorkTreeNote>,
    #[serde(default)]
    pub children: Vec<WorkTreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkTreeNote {
    pub key: String,
    pub phase: String,
    pub body: String,
}

/// A dependency edge between two nodes of the same tree, referenced by
/// their caller-chosen `key`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkTreeDependency {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub dep_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateWorkTreeParams {
    pub root: WorkTreeNode,
    #[serde(default)]
    pub dependencies: Vec<WorkTreeDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompleteTreeParams {
    pub root_id: i64,
    #[schemars(description = "complete (gates enforced per item) or cancel (gates bypassed)")]
    pub trigger: String,
}
