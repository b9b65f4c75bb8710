//! Contract test helpers for validating `Store` implementations.
//!
//! Standardized tests any implementation of `Store` should pass, for use
//! by downstream crates (`mcp-protocol`, `mcp-server`) exercising their own
//! store wiring against `MockStore` without pulling in the full generic
//! suite `database`'s own test target already runs against `SqliteStore`.

use work_item_core::{
    config::WorkflowConfig,
    error::WorkItemError,
    models::{Role, UpdateWorkItem},
    store::Store,
};

use crate::{NewWorkItemBuilder, UpdateWorkItemBuilder};

/// Run the full mock-oriented contract suite against `store`.
pub async fn test_store_contract<S: Store>(store: &S) {
    let workflow = WorkflowConfig::default_bundled();
    test_create_contract(store, &workflow).await;
    test_update_contract(store, &workflow).await;
    test_get_contract(store, &workflow).await;
    test_delete_contract(store, &workflow).await;
    test_health_check_contract(store).await;
    test_stats_contract(store, &workflow).await;
}

pub async fn test_create_contract<S: Store>(store: &S, workflow: &WorkflowConfig) {
    let new_item = NewWorkItemBuilder::new().with_title("Contract create").build();
    let item = store.create_item(new_item, workflow).await.expect("create should succeed");

    assert!(item.id > 0, "created item should have a positive ID");
    assert_eq!(item.title, "Contract create");
    assert_eq!(item.role, Role::Queue, "new items start in the queue role");
}

pub async fn test_update_contract<S: Store>(store: &S, workflow: &WorkflowConfig) {
    let item = store
        .create_item(NewWorkItemBuilder::new().with_title("Update me").build(), workflow)
        .await
        .expect("create should succeed");

    let updated = store
        .update_item(item.id, UpdateWorkItemBuilder::new().with_title("Updated").build())
        .await
        .expect("update should succeed");
    assert_eq!(updated.title, "Updated");
    assert_eq!(updated.id, item.id, "ID should remain unchanged");

    let update_result = store.update_item(999_999, UpdateWorkItem::default()).await;
    assert!(update_result.is_err(), "should fail to update a non-existent item");
    assert!(matches!(update_result.unwrap_err(), WorkItemError::NotFound(_)));
}

pub async fn test_get_contract<S: Store>(store: &S, workflow: &WorkflowConfig) {
    let item = store
        .create_item(NewWorkItemBuilder::new().with_title("Get me").build(), workflow)
        .await
        .expect("create should succeed");

    let retrieved = store.get_item(item.id).await.expect("get should not error").expect("item should exist");
    assert_eq!(retrieved.id, item.id);

    let not_found = store.get_item(999_999).await.expect("get should not error for a missing id");
    assert!(not_found.is_none());
}

pub async fn test_delete_contract<S: Store>(store: &S, workflow: &WorkflowConfig) {
    let item = store
        .create_item(NewWorkItemBuilder::new().with_title("Delete me").build(), workflow)
        .await
        .expect("create should succeed");

    let removed = store.delete_item(item.id, false).await.expect("delete should succeed");
    assert_eq!(removed.len(), 1);
    assert!(store.get_item(item.id).await.unwrap().is_none());

    let not_found_result = store.delete_item(999_999, false).await.expect("deleting a missing id is a no-op");
    assert!(not_found_result.is_empty());
}

pub async fn test_health_check_contract<S: Store>(store: &S) {
    assert!(store.health_check().await.is_ok(), "health check should succeed for a working store");
}

pub async fn test_stats_contract<S: Store>(store: &S, workflow: &WorkflowConfig) {
    store
        .create_item(NewWorkItemBuilder::new().with_title("Stats item").build(), workflow)
        .await
        .expect("create should succeed");

    let stats = store.stats().await.expect("get stats should succeed");
    assert!(stats.total_items > 0, "should report at least one item");
    assert!(!stats.items_by_role.is_empty(), "should have a role breakdown");
}
