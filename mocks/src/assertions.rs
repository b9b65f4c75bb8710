//! Custom assertion helpers for work-item tests.

use work_item_core::models::{Priority, Role, WorkItem};

/// Assert items are equal ignoring timestamps.
pub fn assert_item_equals(actual: &WorkItem, expected: &WorkItem) {
    assert_eq!(actual.id, expected.id, "item IDs don't match");
    assert_eq!(actual.parent_id, expected.parent_id, "parent IDs don't match");
    assert_eq!(actual.title, expected.title, "titles don't match");
    assert_eq!(actual.description, expected.description, "descriptions don't match");
    assert_eq!(actual.tags, expected.tags, "tags don't match");
    assert_eq!(actual.status, expected.status, "statuses don't match");
    assert_eq!(actual.role, expected.role, "roles don't match");
}

/// Assert items are equal including exact timestamps.
pub fn assert_item_equals_exact(actual: &WorkItem, expected: &WorkItem) {
    assert_eq!(actual, expected, "items are not exactly equal");
}

/// Assert an item matches partial criteria.
pub fn assert_item_matches(item: &WorkItem, matcher: &ItemMatcher) {
    if let Some(id) = matcher.id {
        assert_eq!(item.id, id, "item ID doesn't match expected");
    }
    if let Some(ref title) = matcher.title {
        assert_eq!(&item.title, title, "item title doesn't match expected");
    }
    if let Some(role) = matcher.role {
        assert_eq!(item.role, role, "item role doesn't match expected");
    }
    if let Some(ref status) = matcher.status {
        assert_eq!(&item.status, status, "item status doesn't match expected");
    }
    if let Some(priority) = matcher.priority {
        assert_eq!(item.priority, priority, "item priority doesn't match expected");
    }
}

/// Assert an item list contains an item with the given title.
pub fn assert_contains_item_with_title(items: &[WorkItem], title: &str) {
    assert!(
        items.iter().any(|i| i.title == title),
        "expected to find item titled '{}', available titles: {:?}",
        title,
        items.iter().map(|i| &i.title).collect::<Vec<_>>()
    );
}

/// Assert items are sorted by creation date, most recent first.
pub fn assert_items_sorted_by_date(items: &[WorkItem]) {
    for window in items.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "items are not sorted by creation date (most recent first): '{}' ({}) comes before '{}' ({})",
            window[0].title,
            window[0].created_at,
            window[1].title,
            window[1].created_at
        );
    }
}

/// Flexible matcher for partial item assertions.
#[derive(Debug, Default)]
pub struct ItemMatcher {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub role: Option<Role>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
}

impl ItemMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}
