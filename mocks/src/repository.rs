//! Mock implementation of the `Store` trait.
//!
//! Provides a thread-safe in-memory store with error injection and call
//! tracking, for use by other crates' unit tests (the `mcp-protocol`
//! dispatcher tests in particular need to assert which store methods a
//! given tool call reaches, and to simulate a failing backend).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use work_item_core::{
    config::WorkflowConfig,
    error::{Result, WorkItemError},
    models::{
        Dependency, ItemFilter, NewDependency, NewWorkItem, Note, RoleTransition,
        UpdateWorkItem, UpsertNote, WorkItem,
    },
    store::{PendingTransition, Store, StoreStats},
};

#[derive(Default)]
struct Inner {
    items: HashMap<i64, WorkItem>,
    notes: HashMap<i64, Note>,
    dependencies: HashMap<i64, Dependency>,
    transitions: HashMap<i64, RoleTransition>,
    next_note_id: i64,
    next_dep_id: i64,
    next_transition_id: i64,
}

/// In-memory `Store` double with error injection and call history tracking.
pub struct MockStore {
    inner: Mutex<Inner>,
    next_item_id: AtomicI64,
    error_injection: Mutex<Option<WorkItemError>>,
    call_history: Mutex<Vec<String>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_item_id: AtomicI64::new(1),
            error_injection: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock store pre-populated with `items`, keyed by their own
    /// `id` fields; the next-id counter starts above the highest seen id.
    pub fn with_items(items: Vec<WorkItem>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for item in items {
            max_id = max_id.max(item.id);
            map.insert(item.id, item);
        }
        Self {
            inner: Mutex::new(Inner { items: map, ..Default::default() }),
            next_item_id: AtomicI64::new(max_id + 1),
            error_injection: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
        }
    }

    /// The next call to any `Store` method returns `error` instead of
    /// running its normal logic, then clears the injection.
    pub fn inject_error(&self, error: WorkItemError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. Call history: {:?}",
            *history
        );
    }

    fn check_error_injection(&self) -> Result<()> {
        let mut error_opt = self.error_injection.lock();
        if let Some(error) = error_opt.take() {
            return Err(error);
        }
        Ok(())
    }

    fn record_call(&self, method: &str) {
        self.call_history.lock().push(format!("{method}()"));
    }

    fn record_call_with_params(&self, method: &str, params: &str) {
        self.call_history.lock().push(format!("{method}({params})"));
    }
}

#[async_trait]
impl Store for MockStore {
    async fn create_item(&self, new: NewWorkItem, workflow: &WorkflowConfig) -> Result<WorkItem> {
        self.record_call_with_params("create_item", &format!("title={}", new.title));
        self.check_error_injection()?;

        let (status, role) = workflow.initial_status_and_role(&new.tags, new.status.as_deref())?;
        let mut guard = self.inner.lock();
        let depth = match new.parent_id {
            Some(pid) => {
                let parent = guard
                    .items
                    .get(&pid)
                    .ok_or_else(|| WorkItemError::item_not_found(pid))?;
                if parent.depth >= WorkItem::MAX_DEPTH {
                    return Err(WorkItemError::max_depth_exceeded(pid));
                }
                parent.depth + 1
            }
            None => 0,
        };

        let id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let item = WorkItem {
            id,
            parent_id: new.parent_id,
            depth,
            title: new.title,
            description: new.description,
            tags: new.tags,
            priority: new.priority,
            status,
            role,
            previous_role: None,
            role_changed_at: now,
            created_at: now,
            modified_at: now,
        };
        guard.items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, id: i64, updates: UpdateWorkItem) -> Result<WorkItem> {
        self.record_call_with_params("update_item", &format!("id={id}"));
        self.check_error_injection()?;

        let mut guard = self.inner.lock();
        let item = guard
            .items
            .get_mut(&id)
            .ok_or_else(|| WorkItemError::item_not_found(id))?;
        if let Some(title) = updates.title {
            item.title = title;
        }
        if let Some(description) = updates.description {
            item.description = description;
        }
        if let Some(tags) = updates.tags {
            item.tags = tags;
        }
        if let Some(priority) = updates.priority {
            item.priority = priority;
        }
        if let Some(parent_id) = updates.parent_id {
            item.parent_id = parent_id;
        }
        item.modified_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&self, id: i64, recursive: bool) -> Result<Vec<WorkItem>> {
        self.record_call_with_params("delete_item", &format!("id={id}, recursive={recursive}"));
        self.check_error_injection()?;

        let mut guard = self.inner.lock();
        let has_children = guard.items.values().any(|i| i.parent_id == Some(id));
        if has_children && !recursive {
            return Err(WorkItemError::Conflict(format!(
                "item {id} has children; pass recursive=true"
            )));
        }
        let mut to_delete = vec![id];
        let mut i = 0;
        while i < to_delete.len() {
            let current = to_delete[i];
            let children: Vec<i64> = guard
                .items
                .values()
                .filter(|it| it.parent_id == Some(current))
                .map(|it| it.id)
                .collect();
            to_delete.extend(children);
            i += 1;
        }
        let mut removed = Vec::new();
        for item_id in &to_delete {
            if let Some(item) = guard.items.remove(item_id) {
                removed.push(item);
            }
            guard.notes.retain(|_, n| n.item_id != *item_id);
            guard
                .dependencies
                .retain(|_, d| d.from_item_id != *item_id && d.to_item_id != *item_id);
            guard.transitions.retain(|_, t| t.item_id != *item_id);
        }
        Ok(removed)
    }

    async fn get_item(&self, id: i64) -> Result<Option<WorkItem>> {
        self.record_call_with_params("get_item", &format!("id={id}"));
        self.check_error_injection()?;
        Ok(self.inner.lock().items.get(&id).cloned())
    }

    async fn items_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<WorkItem>> {
        self.record_call("items_by_parent");
        self.check_error_injection()?;
        Ok(self
            .inner
            .lock()
            .items
            .values()
            .filter(|i| i.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn query_items(&self, filter: ItemFilter) -> Result<Vec<WorkItem>> {
        self.record_call("query_items");
        self.check_error_injection()?;
        let guard = self.inner.lock();
        let mut results: Vec<WorkItem> = guard
            .items
            .values()
            .filter(|i| filter.parent_id.map(|p| p == i.parent_id).unwrap_or(true))
            .filter(|i| filter.role.map(|r| r == i.role).unwrap_or(true))
            .filter(|i| filter.status.as_ref().map(|s| s == &i.status).unwrap_or(true))
            .filter(|i| filter.tag.as_ref().map(|t| i.has_tag(t)).unwrap_or(true))
            .filter(|i| {
                filter
                    .text
                    .as_ref()
                    .map(|t| {
                        i.title.contains(t.as_str())
                            || i.description.as_deref().is_some_and(|d| d.contains(t.as_str()))
                    })
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        results.sort_by_key(|i| i.id);
        if let Some(offset) = filter.offset {
            results = results.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            results.truncate(limit as usize);
        }
        Ok(results)
    }

    async fn all_items(&self) -> Result<Vec<WorkItem>> {
        self.record_call("all_items");
        self.check_error_injection()?;
        Ok(self.inner.lock().items.values().cloned().collect())
    }

    async fn apply_transitions(&self, transitions: Vec<PendingTransition>) -> Result<Vec<WorkItem>> {
        self.record_call_with_params("apply_transitions", &format!("count={}", transitions.len()));
        self.check_error_injection()?;

        let mut guard = self.inner.lock();
        for t in &transitions {
            let item = guard
                .items
                .get(&t.item_id)
                .ok_or_else(|| WorkItemError::item_not_found(t.item_id))?;
            if item.status != t.expected_status {
                return Err(WorkItemError::ConcurrencyExhausted);
            }
        }
        let mut results = Vec::new();
        for t in transitions {
            let item = guard.items.get_mut(&t.item_id).unwrap();
            let from_role = item.role;
            item.previous_role = Some(from_role);
            item.role = t.new_role;
            item.status = t.new_status.clone();
            item.role_changed_at = Utc::now();
            item.modified_at = item.role_changed_at;
            let snapshot = item.clone();
            if from_role != t.new_role {
                guard.next_transition_id += 1;
                let tid = guard.next_transition_id;
                guard.transitions.insert(
                    tid,
                    RoleTransition {
                        id: tid,
                        item_id: t.item_id,
                        from_role,
                        to_role: t.new_role,
                        from_status: t.expected_status,
                        to_status: t.new_status,
                        trigger: t.trigger,
                        applied_at: Utc::now(),
                        actor: t.actor,
                    },
                );
            }
            results.push(snapshot);
        }
        Ok(results)
    }

    async fn upsert_note(&self, note: UpsertNote) -> Result<Note> {
        self.record_call_with_params("upsert_note", &format!("item_id={}, key={}", note.item_id, note.key));
        self.check_error_injection()?;

        let mut guard = self.inner.lock();
        if !guard.items.contains_key(&note.item_id) {
            return Err(WorkItemError::item_not_found(note.item_id));
        }
        let existing = guard
            .notes
            .values()
            .find(|n| n.item_id == note.item_id && n.key == note.key)
            .map(|n| n.id);
        let now = Utc::now();
        if let Some(id) = existing {
            let n = guard.notes.get_mut(&id).unwrap();
            n.body = note.body;
            n.phase = note.phase;
            n.modified_at = now;
            return Ok(n.clone());
        }
        guard.next_note_id += 1;
        let id = guard.next_note_id;
        let n = Note {
            id,
            item_id: note.item_id,
            key: note.key,
            phase: note.phase,
            body: note.body,
            created_at: now,
            modified_at: now,
        };
        guard.notes.insert(id, n.clone());
        Ok(n)
    }

    async fn delete_note(&self, item_id: i64, key: &str) -> Result<()> {
        self.record_call_with_params("delete_note", &format!("item_id={item_id}, key={key}"));
        self.check_error_injection()?;

        let mut guard = self.inner.lock();
        let id = guard
            .notes
            .values()
            .find(|n| n.item_id == item_id && n.key == key)
            .map(|n| n.id)
            .ok_or_else(|| WorkItemError::note_not_found(item_id, key))?;
        guard.notes.remove(&id);
        Ok(())
    }

    async fn notes_by_item(&self, item_id: i64) -> Result<Vec<Note>> {
        self.record_call("notes_by_item");
        self.check_error_injection()?;
        Ok(self
            .inner
            .lock()
            .notes
            .values()
            .filter(|n| n.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency> {
        self.record_call("create_dependency");
        self.check_error_injection()?;

        if dep.from_item_id == dep.to_item_id {
            return Err(WorkItemError::self_dependency(dep.from_item_id));
        }
        let mut guard = self.inner.lock();
        let duplicate = guard.dependencies.values().any(|d| {
            d.from_item_id == dep.from_item_id
                && d.to_item_id == dep.to_item_id
                && d.dep_type == dep.dep_type
        });
        if duplicate {
            return Err(WorkItemError::duplicate_dependency(dep.from_item_id, dep.to_item_id));
        }
        guard.next_dep_id += 1;
        let id = guard.next_dep_id;
        let d = Dependency {
            id,
            from_item_id: dep.from_item_id,
            to_item_id: dep.to_item_id,
            dep_type: dep.dep_type,
            created_at: Utc::now(),
        };
        guard.dependencies.insert(id, d.clone());
        Ok(d)
    }

    async fn delete_dependency(&self, id: i64) -> Result<()> {
        self.record_call_with_params("delete_dependency", &format!("id={id}"));
        self.check_error_injection()?;
        let mut guard = self.inner.lock();
        guard
            .dependencies
            .remove(&id)
            .ok_or_else(|| WorkItemError::dependency_not_found(id))?;
        Ok(())
    }

    async fn dependencies_by_from_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        self.record_call("dependencies_by_from_item");
        self.check_error_injection()?;
        Ok(self
            .inner
            .lock()
            .dependencies
            .values()
            .filter(|d| d.from_item_id == item_id)
            .cloned()
            .collect())
    }

    async fn dependencies_by_to_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        self.record_call("dependencies_by_to_item");
        self.check_error_injection()?;
        Ok(self
            .inner
            .lock()
            .dependencies
            .values()
            .filter(|d| d.to_item_id == item_id)
            .cloned()
            .collect())
    }

    async fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        self.record_call("all_dependencies");
        self.check_error_injection()?;
        Ok(self.inner.lock().dependencies.values().cloned().collect())
    }

    async fn transitions_by_item(&self, item_id: i64) -> Result<Vec<RoleTransition>> {
        self.record_call("transitions_by_item");
        self.check_error_injection()?;
        let mut rows: Vec<RoleTransition> = self
            .inner
            .lock()
            .transitions
            .values()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn health_check(&self) -> Result<()> {
        self.record_call("health_check");
        self.check_error_injection()?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.record_call("stats");
        self.check_error_injection()?;
        let guard = self.inner.lock();
        let mut by_role = HashMap::new();
        let mut by_status = HashMap::new();
        for item in guard.items.values() {
            *by_role.entry(item.role).or_insert(0) += 1;
            *by_status.entry(item.status.clone()).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total_items: guard.items.len() as u64,
            items_by_role: by_role,
            items_by_status: by_status,
            latest_created: guard.items.values().map(|i| i.created_at).max(),
            latest_role_change: guard.items.values().map(|i| i.role_changed_at).max(),
        })
    }
}
