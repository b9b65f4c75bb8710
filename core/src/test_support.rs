//! Minimal in-memory [`Store`] used only by this crate's own unit tests
//! (graph/workflow/cascade). The `mocks` crate provides the richer
//! fixture-generating double used by downstream crates; this one stays
//! deliberately small and dependency-free.
#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkItemError};
use crate::models::{
    Dependency, ItemFilter, NewDependency, NewWorkItem, Note, Priority, Role, RoleTransition,
    UpdateWorkItem, UpsertNote, WorkItem,
};
use crate::store::{PendingTransition, Store, StoreStats};

#[derive(Default)]
struct Inner {
    items: HashMap<i64, WorkItem>,
    notes: HashMap<i64, Note>,
    dependencies: HashMap<i64, Dependency>,
    transitions: HashMap<i64, RoleTransition>,
    next_item_id: i64,
    next_note_id: i64,
    next_dep_id: i64,
    next_transition_id: i64,
}

pub struct InMemoryTestStore {
    inner: Mutex<Inner>,
}

impl InMemoryTestStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Test helper: create a bare item with status "pending"/role queue
    /// under `parent`, bypassing validation — returns its id.
    pub async fn seed_item(&self, parent: Option<i64>) -> i64 {
        let mut guard = self.inner.lock().unwrap();
        guard.next_item_id += 1;
        let id = guard.next_item_id;
        let depth = parent
            .and_then(|p| guard.items.get(&p))
            .map(|p| p.depth + 1)
            .unwrap_or(0);
        let now = Utc::now();
        guard.items.insert(
            id,
            WorkItem {
                id,
                parent_id: parent,
                depth,
                title: format!("item {id}"),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: "pending".to_string(),
                role: Role::Queue,
                previous_role: None,
                role_changed_at: now,
                created_at: now,
                modified_at: now,
            },
        );
        id
    }

    /// Test helper: force an item directly into role=terminal, bypassing
    /// the workflow engine.
    pub async fn mark_terminal(&self, id: i64) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(item) = guard.items.get_mut(&id) {
            item.previous_role = Some(item.role);
            item.role = Role::Terminal;
            item.status = "done".to_string();
            item.role_changed_at = Utc::now();
        }
    }
}

#[async_trait]
impl Store for InMemoryTestStore {
    async fn create_item(&self, new: NewWorkItem, workflow: &WorkflowConfig) -> Result<WorkItem> {
        let (status, role) = workflow.initial_status_and_role(&new.tags, new.status.as_deref())?;
        let mut guard = self.inner.lock().unwrap();
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
        guard.next_item_id += 1;
        let id = guard.next_item_id;
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
        let mut guard = self.inner.lock().unwrap();
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
        let mut guard = self.inner.lock().unwrap();
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
        Ok(self.inner.lock().unwrap().items.get(&id).cloned())
    }

    async fn items_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<WorkItem>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| i.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn query_items(&self, filter: ItemFilter) -> Result<Vec<WorkItem>> {
        let guard = self.inner.lock().unwrap();
        Ok(guard
            .items
            .values()
            .filter(|i| filter.role.map(|r| r == i.role).unwrap_or(true))
            .filter(|i| {
                filter
                    .status
                    .as_ref()
                    .map(|s| s == &i.status)
                    .unwrap_or(true)
            })
            .filter(|i| filter.tag.as_ref().map(|t| i.has_tag(t)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn all_items(&self) -> Result<Vec<WorkItem>> {
        Ok(self.inner.lock().unwrap().items.values().cloned().collect())
    }

    async fn apply_transitions(
        &self,
        transitions: Vec<PendingTransition>,
    ) -> Result<Vec<WorkItem>> {
        let mut guard = self.inner.lock().unwrap();
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
        let mut guard = self.inner.lock().unwrap();
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
        let mut guard = self.inner.lock().unwrap();
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
        Ok(self
            .inner
            .lock()
            .unwrap()
            .notes
            .values()
            .filter(|n| n.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency> {
        if dep.from_item_id == dep.to_item_id {
            return Err(WorkItemError::self_dependency(dep.from_item_id));
        }
        let mut guard = self.inner.lock().unwrap();
        let duplicate = guard.dependencies.values().any(|d| {
            d.from_item_id == dep.from_item_id
                && d.to_item_id == dep.to_item_id
                && d.dep_type == dep.dep_type
        });
        if duplicate {
            return Err(WorkItemError::duplicate_dependency(
                dep.from_item_id,
                dep.to_item_id,
            ));
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
        let mut guard = self.inner.lock().unwrap();
        guard
            .dependencies
            .remove(&id)
            .ok_or_else(|| WorkItemError::dependency_not_found(id))?;
        Ok(())
    }

    async fn dependencies_by_from_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .dependencies
            .values()
            .filter(|d| d.from_item_id == item_id)
            .cloned()
            .collect())
    }

    async fn dependencies_by_to_item(&self, item_id: i64) -> Result<Vec<Dependency>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .dependencies
            .values()
            .filter(|d| d.to_item_id == item_id)
            .cloned()
            .collect())
    }

    async fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .dependencies
            .values()
            .cloned()
            .collect())
    }

    async fn transitions_by_item(&self, item_id: i64) -> Result<Vec<RoleTransition>> {
        let mut rows: Vec<RoleTransition> = self
            .inner
            .lock()
            .unwrap()
            .transitions
            .values()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let guard = self.inner.lock().unwrap();
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
