//! Standard test fixtures for consistent testing.

use chrono::Utc;
use work_item_core::models::{NewWorkItem, Priority, Role, UpdateWorkItem, WorkItem};

/// A basic test item with sensible defaults.
pub fn create_test_item() -> WorkItem {
    let now = Utc::now();
    WorkItem {
        id: 1,
        parent_id: None,
        depth: 0,
        title: "Test item".to_string(),
        description: Some("A standard test item with default values".to_string()),
        tags: vec!["test".to_string()],
        priority: Priority::Medium,
        status: "pending".to_string(),
        role: Role::Queue,
        previous_role: None,
        role_changed_at: now,
        created_at: now,
        modified_at: now,
    }
}

/// A test item already in `role`.
pub fn create_test_item_with_role(role: Role) -> WorkItem {
    let mut item = create_test_item();
    item.previous_role = Some(item.role);
    item.role = role;
    item
}

/// A test item with specific tags.
pub fn create_test_item_with_tags(tags: Vec<String>) -> WorkItem {
    let mut item = create_test_item();
    item.tags = tags;
    item
}

/// Multiple unique items, cycling through every role.
pub fn create_test_items(count: usize) -> Vec<WorkItem> {
    let roles = [Role::Queue, Role::Work, Role::Review, Role::Blocked, Role::Terminal];
    (1..=count)
        .map(|i| {
            let now = Utc::now();
            let role = roles[i % roles.len()];
            WorkItem {
                id: i as i64,
                parent_id: None,
                depth: 0,
                title: format!("Test item {i}"),
                description: Some(format!("Test item number {i} for bulk testing")),
                tags: vec![format!("batch-{}", i % 3)],
                priority: Priority::Medium,
                status: "pending".to_string(),
                role,
                previous_role: None,
                role_changed_at: now,
                created_at: now,
                modified_at: now,
            }
        })
        .collect()
}

/// One item in each of the five roles.
pub fn create_items_in_all_roles() -> Vec<WorkItem> {
    [Role::Queue, Role::Work, Role::Review, Role::Blocked, Role::Terminal]
        .into_iter()
        .enumerate()
        .map(|(i, role)| {
            let now = Utc::now();
            WorkItem {
                id: (i + 1) as i64,
                parent_id: None,
                depth: 0,
                title: format!("{role} item"),
                description: Some(format!("item in {role} role")),
                tags: vec![],
                priority: Priority::Medium,
                status: role.to_string(),
                role,
                previous_role: None,
                role_changed_at: now,
                created_at: now,
                modified_at: now,
            }
        })
        .collect()
}

/// A standard `NewWorkItem` for testing creation.
pub fn create_new_item() -> NewWorkItem {
    NewWorkItem {
        parent_id: None,
        title: "New test item".to_string(),
        description: Some("A new item for testing creation".to_string()),
        tags: vec!["test".to_string()],
        priority: Priority::Medium,
        status: None,
    }
}

/// A `NewWorkItem` with a specific title.
pub fn create_new_item_with_title(title: &str) -> NewWorkItem {
    let mut item = create_new_item();
    item.title = title.to_string();
    item
}

/// A standard `UpdateWorkItem` for testing updates.
pub fn create_update_item() -> UpdateWorkItem {
    UpdateWorkItem {
        title: Some("Updated item title".to_string()),
        description: Some(Some("Updated item description".to_string())),
        tags: None,
        priority: None,
        parent_id: None,
    }
}

/// An `UpdateWorkItem` touching only the title.
pub fn create_update_item_with_title(title: &str) -> UpdateWorkItem {
    UpdateWorkItem { title: Some(title.to_string()), ..Default::default() }
}
