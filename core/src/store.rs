use async_trait::async_trait;

use crate::{
    config::WorkflowConfig,
    error::Result,
    models::{
        Dependency, ItemFilter, NewDependency, NewWorkItem, Note, Role, RoleTransition, Trigger,
        UpdateWorkItem, UpsertNote, WorkItem,
    },
};

/// Aggregate counts surfaced by `query_items(overview)` and health checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub total_items: u64,
    pub items_by_role: std::collections::HashMap<Role, u64>,
    pub items_by_status: std::collections::HashMap<String, u64>,
    pub latest_created: Option<chrono::DateTime<chrono::Utc>>,
    pub latest_role_change: Option<chrono::DateTime<chrono::Utc>>,
}

/// One role/status move to apply as part of an atomic batch. The `expected_status`
/// field is the optimistic-concurrency guard: the store must verify the row
/// still carries it before writing, so two callers racing on the same item
/// never silently clobber each other.
#[derive(Debug, Clone)]
pub struct PendingTransition {
    pub item_id: i64,
    pub expected_status: String,
    pub new_status: String,
    pub new_role: Role,
    pub trigger: Trigger,
    pub actor: Option<String>,
}

/// Persistence interface for work items, notes, dependencies and the
/// role-transition audit log.
///
/// Implementations must be thread-safe and support concurrent access.
/// A single triggering transition plus every cascade event it produces is
/// applied through [`Store::apply_transitions`], which the sqlite
/// implementation wraps in one database transaction (grounded in the
/// teacher's `claim_task` explicit `pool.begin()`/`tx.commit()` pattern) so
/// a cascade either lands completely or not at all.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a new work item. Enforces the max-nesting-depth invariant
    /// against `parent_id` before insert, and resolves `item.status`/the
    /// derived `role` against `workflow`'s active flow for `item.tags` —
    /// the flow's first sequence status when `item.status` is absent.
    async fn create_item(&self, item: NewWorkItem, workflow: &WorkflowConfig) -> Result<WorkItem>;

    /// Apply a partial update to an item's title/description/tags/priority/
    /// parent. Never changes `status` or `role` — that is the workflow
    /// engine's exclusive concern via [`Store::apply_transitions`].
    async fn update_item(&self, id: i64, updates: UpdateWorkItem) -> Result<WorkItem>;

    /// Delete an item. `recursive = false` fails with `Conflict` if the
    /// item has children; `recursive = true` deletes the whole subtree and
    /// returns every deleted item.
    async fn delete_item(&self, id: i64, recursive: bool) -> Result<Vec<WorkItem>>;

    async fn get_item(&self, id: i64) -> Result<Option<WorkItem>>;

    async fn items_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<WorkItem>>;

    async fn query_items(&self, filter: ItemFilter) -> Result<Vec<WorkItem>>;

    async fn all_items(&self) -> Result<Vec<WorkItem>>;

    /// Apply one or more role/status transitions as a single atomic unit,
    /// recording one audit row per transition. Used both for a bare
    /// `advance_item` call (a one-element batch) and for a cascade (the
    /// triggering transition plus every parent transition it produces).
    /// Fails the whole batch with `ConcurrencyExhausted` if any element's
    /// `expected_status` no longer matches after the configured retry
    /// budget, leaving no partial effect.
    async fn apply_transitions(
        &self,
        transitions: Vec<PendingTransition>,
    ) -> Result<Vec<WorkItem>>;

    async fn upsert_note(&self, note: UpsertNote) -> Result<Note>;

    async fn delete_note(&self, item_id: i64, key: &str) -> Result<()>;

    async fn notes_by_item(&self, item_id: i64) -> Result<Vec<Note>>;

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency>;

    async fn delete_dependency(&self, id: i64) -> Result<()>;

    async fn dependencies_by_from_item(&self, item_id: i64) -> Result<Vec<Dependency>>;

    async fn dependencies_by_to_item(&self, item_id: i64) -> Result<Vec<Dependency>>;

    async fn all_dependencies(&self) -> Result<Vec<Dependency>>;

    async fn transitions_by_item(&self, item_id: i64) -> Result<Vec<RoleTransition>>;

    async fn health_check(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_stats_default_is_empty() {
        let stats = StoreStats::default();
        assert_eq!(stats.total_items, 0);
        assert!(stats.items_by_role.is_empty());
        assert!(stats.items_by_status.is_empty());
    }

    #[test]
    fn pending_transition_carries_expected_status_guard() {
        let t = PendingTransition {
            item_id: 1,
            expected_status: "in_progress".into(),
            new_status: "done".into(),
            new_role: Role::Terminal,
            trigger: Trigger::Complete,
            actor: None,
        };
        assert_eq!(t.expected_status, "in_progress");
    }
}
