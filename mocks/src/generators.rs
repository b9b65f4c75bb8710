//! Random test data generators using the `fake` and `proptest` crates.

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;
use work_item_core::models::{ItemFilter, Priority, Role, WorkItem};

/// Generate a realistic tag drawn from a small closed vocabulary.
pub fn generate_tag() -> String {
    let tags = ["backend", "frontend", "infra", "docs", "bug", "research", "design"];
    tags[rand::thread_rng().gen_range(0..tags.len())].to_string()
}

/// Generate a realistic work-item title.
pub fn generate_item_title() -> String {
    Sentence(3..8).fake()
}

/// Generate a realistic work-item description.
pub fn generate_item_description() -> String {
    Paragraph(2..5).fake()
}

/// Generate a random role.
pub fn generate_random_role() -> Role {
    let roles = [Role::Queue, Role::Work, Role::Review, Role::Blocked, Role::Terminal];
    roles[rand::thread_rng().gen_range(0..roles.len())]
}

/// Generate a random priority.
pub fn generate_random_priority() -> Priority {
    let priorities = [Priority::Low, Priority::Medium, Priority::High];
    priorities[rand::thread_rng().gen_range(0..priorities.len())]
}

/// Generate a random work item with realistic field values. Does not
/// respect the max-depth invariant — callers inserting into a `Store`
/// should keep `parent_id` within bounds themselves.
pub fn generate_random_item() -> WorkItem {
    let id: u32 = (1..99999).fake();
    let now = Utc::now();
    let role = generate_random_role();
    WorkItem {
        id: id as i64,
        parent_id: None,
        depth: 0,
        title: generate_item_title(),
        description: Some(generate_item_description()),
        tags: vec![generate_tag()],
        priority: generate_random_priority(),
        status: "pending".to_string(),
        role,
        previous_role: None,
        role_changed_at: now,
        created_at: now,
        modified_at: now,
    }
}

/// Configurable item generator, analogous to a seeded factory.
pub struct ItemGenerator {
    pub title_prefix: String,
    pub tag_pool: Vec<String>,
}

impl Default for ItemGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemGenerator {
    pub fn new() -> Self {
        Self {
            title_prefix: "Test item".to_string(),
            tag_pool: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
        }
    }

    pub fn generate(&self) -> WorkItem {
        let id: u32 = (1..99999).fake();
        let now = Utc::now();
        let tag = &self.tag_pool[rand::thread_rng().gen_range(0..self.tag_pool.len())];
        WorkItem {
            id: id as i64,
            parent_id: None,
            depth: 0,
            title: format!("{} {id}", self.title_prefix),
            description: Some(generate_item_description()),
            tags: vec![tag.clone()],
            priority: generate_random_priority(),
            status: "pending".to_string(),
            role: Role::Queue,
            previous_role: None,
            role_changed_at: now,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Proptest strategy for generating a valid role.
pub fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Queue),
        Just(Role::Work),
        Just(Role::Review),
        Just(Role::Blocked),
        Just(Role::Terminal),
    ]
}

/// Proptest strategy for generating a valid priority.
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High)]
}

/// Proptest strategy for generating complete work items (`depth` always 0,
/// `parent_id` always `None` — callers composing a tree build that layer
/// themselves).
pub fn item_strategy() -> impl Strategy<Value = WorkItem> {
    (
        1i64..99999,
        "[A-Za-z ]{5,50}",
        "[A-Za-z0-9 .,!?]{10,200}",
        prop::collection::vec("[a-z-]{3,12}", 0..3),
        role_strategy(),
        priority_strategy(),
    )
        .prop_map(|(id, title, description, tags, role, priority)| {
            let now = Utc::now();
            WorkItem {
                id,
                parent_id: None,
                depth: 0,
                title,
                description: Some(description),
                tags,
                priority,
                status: "pending".to_string(),
                role,
                previous_role: None,
                role_changed_at: now,
                created_at: now,
                modified_at: now,
            }
        })
}

/// Proptest strategy for generating item filters.
pub fn item_filter_strategy() -> impl Strategy<Value = ItemFilter> {
    (proptest::option::of("[a-z-]{3,12}"), proptest::option::of(role_strategy())).prop_map(
        |(tag, role)| ItemFilter { tag, role, ..Default::default() },
    )
}
