//! Integration tests for the mocks crate: confirms the mock implementations
//! and utilities behave correctly before other crates build tests on top.

use mocks::*;
use work_item_core::{config::WorkflowConfig, error::WorkItemError, models::Role, store::Store};

#[tokio::test]
async fn mock_store_basic_operations() {
    let store = MockStore::new();
    let workflow = WorkflowConfig::default_bundled();

    let new_item = create_new_item();
    let item = store.create_item(new_item, &workflow).await.unwrap();

    assert_eq!(item.id, 1);
    assert_eq!(item.title, "New test item");
    assert_eq!(item.role, Role::Queue);

    store.assert_called("create_item");

    let retrieved = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(retrieved.id, item.id);

    store.assert_called("get_item");
}

#[tokio::test]
async fn mock_store_error_injection() {
    let store = MockStore::new();

    store.inject_error(WorkItemError::item_not_found(99));

    let result = store.get_item(1).await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), WorkItemError::NotFound(_)));

    store.clear_error();
    let result = store.get_item(1).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn mock_store_depth_cap_is_enforced() {
    let store = MockStore::new();
    let workflow = WorkflowConfig::default_bundled();

    let mut parent_id: Option<i64> = None;
    let mut last_id = 0;
    for _ in 0..=work_item_core::models::WorkItem::MAX_DEPTH {
        let builder = match parent_id {
            Some(pid) => NewWorkItemBuilder::new().with_parent_id(pid),
            None => NewWorkItemBuilder::new(),
        };
        let item = store.create_item(builder.build(), &workflow).await.unwrap();
        parent_id = Some(item.id);
        last_id = item.id;
    }

    let result = store
        .create_item(NewWorkItemBuilder::new().with_parent_id(last_id).build(), &workflow)
        .await;
    assert!(matches!(result, Err(WorkItemError::Conflict(_))));
}

#[tokio::test]
async fn fixtures_create_items_in_all_roles() {
    let items = create_items_in_all_roles();

    assert_eq!(items.len(), 5);

    let roles: Vec<_> = items.iter().map(|i| i.role).collect();
    assert!(roles.contains(&Role::Queue));
    assert!(roles.contains(&Role::Work));
    assert!(roles.contains(&Role::Review));
    assert!(roles.contains(&Role::Blocked));
    assert!(roles.contains(&Role::Terminal));
}

#[tokio::test]
async fn builders_work_item_builder() {
    let item = WorkItemBuilder::new()
        .with_id(42)
        .with_title("Built item")
        .with_role(Role::Work)
        .with_status("coding")
        .build();

    assert_eq!(item.id, 42);
    assert_eq!(item.title, "Built item");
    assert_eq!(item.role, Role::Work);
    assert_eq!(item.previous_role, Some(Role::Queue));
    assert_eq!(item.status, "coding");
}

#[tokio::test]
async fn assertions_item_equals() {
    let item1 = create_test_item();
    let mut item2 = item1.clone();

    assert_item_equals(&item1, &item2);

    item2.title = "Different title".to_string();

    let result = std::panic::catch_unwind(|| {
        assert_item_equals(&item1, &item2);
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn generators_produce_realistic_data() {
    let item = generate_random_item();

    assert!(item.id > 0);
    assert!(!item.title.is_empty());
    assert!(item.description.as_ref().is_some_and(|d| !d.is_empty()));
    assert!(!item.tags.is_empty());
}

#[tokio::test]
async fn mock_store_concurrent_creates_get_unique_ids() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let store = Arc::new(MockStore::new());
    let workflow = Arc::new(WorkflowConfig::default_bundled());
    let mut set = JoinSet::new();

    for i in 0..10 {
        let store = store.clone();
        let workflow = workflow.clone();
        set.spawn(async move {
            store
                .create_item(NewWorkItemBuilder::new().with_title(format!("Concurrent {i}")).build(), &workflow)
                .await
                .unwrap()
        });
    }

    let mut items = Vec::new();
    while let Some(result) = set.join_next().await {
        items.push(result.unwrap());
    }

    assert_eq!(items.len(), 10);

    let mut ids: Vec<_> = items.iter().map(|i| i.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn mock_store_stats_reflect_seeded_items() {
    let items = create_items_in_all_roles();
    let store = MockStore::with_items(items);

    let stats = store.stats().await.unwrap();

    assert_eq!(stats.total_items, 5);
    assert!(stats.items_by_role.contains_key(&Role::Queue));
    assert!(stats.items_by_role.contains_key(&Role::Terminal));
    assert!(stats.latest_created.is_some());
}

#[tokio::test]
async fn contract_suite_passes_against_the_mock_store() {
    let store = MockStore::new();

    test_store_contract(&store).await;

    let history = store.call_history();
    assert!(!history.is_empty(), "mock should have recorded method calls");
    assert!(history.iter().any(|call| call.contains("create_item")));
    assert!(history.iter().any(|call| call.contains("get_item")));
}
