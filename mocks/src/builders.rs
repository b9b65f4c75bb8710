//! Fluent builders for constructing work-item domain types in tests.

use chrono::{DateTime, Utc};
use work_item_core::models::{ItemFilter, NewWorkItem, Priority, Role, UpdateWorkItem, WorkItem};

/// Builder for constructing `WorkItem` instances directly (bypassing a
/// `Store`), useful for `MockStore::with_items` seeding.
pub struct WorkItemBuilder {
    item: WorkItem,
}

impl Default for WorkItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkItemBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            item: WorkItem {
                id: 1,
                parent_id: None,
                depth: 0,
                title: "Test item".to_string(),
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
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.item.id = id;
        self
    }

    pub fn with_parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.item.parent_id = parent_id;
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.item.depth = depth;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.item.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.item.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.item.tags = tags;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.item.priority = priority;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.item.status = status.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.item.previous_role = Some(self.item.role);
        self.item.role = role;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.item.created_at = created_at;
        self
    }

    pub fn build(self) -> WorkItem {
        self.item
    }
}

/// Builder for `NewWorkItem` instances.
pub struct NewWorkItemBuilder {
    new_item: NewWorkItem,
}

impl Default for NewWorkItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewWorkItemBuilder {
    pub fn new() -> Self {
        Self {
            new_item: NewWorkItem {
                parent_id: None,
                title: "New test item".to_string(),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: None,
            },
        }
    }

    pub fn with_parent_id(mut self, parent_id: i64) -> Self {
        self.new_item.parent_id = Some(parent_id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_item.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.new_item.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.new_item.tags = tags;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.new_item.priority = priority;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.new_item.status = Some(status.into());
        self
    }

    pub fn build(self) -> NewWorkItem {
        self.new_item
    }
}

/// Builder for `UpdateWorkItem` instances.
pub struct UpdateWorkItemBuilder {
    update: UpdateWorkItem,
}

impl Default for UpdateWorkItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateWorkItemBuilder {
    pub fn new() -> Self {
        Self { update: UpdateWorkItem::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.update.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.update.description = Some(Some(description.into()));
        self
    }

    pub fn clearing_description(mut self) -> Self {
        self.update.description = Some(None);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.update.tags = Some(tags);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.update.priority = Some(priority);
        self
    }

    pub fn with_parent_id(mut self, parent_id: i64) -> Self {
        self.update.parent_id = Some(Some(parent_id));
        self
    }

    pub fn build(self) -> UpdateWorkItem {
        self.update
    }
}

/// Builder for `ItemFilter` instances.
pub struct ItemFilterBuilder {
    filter: ItemFilter,
}

impl Default for ItemFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemFilterBuilder {
    pub fn new() -> Self {
        Self { filter: ItemFilter::default() }
    }

    pub fn with_parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.filter.parent_id = Some(parent_id);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.filter.role = Some(role);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.filter.status = Some(status.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tag = Some(tag.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn build(self) -> ItemFilter {
        self.filter
    }
}
