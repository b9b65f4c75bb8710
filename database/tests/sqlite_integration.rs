use std::sync::Arc;

use database::{NewWorkItem, PendingTransition, Priority, Role, SqliteStore, Store, Trigger, WorkflowConfig};

async fn create_test_store() -> SqliteStore {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let thread_id = std::thread::current().id();
    let db_name = format!(":memory:sqlite_integration_{timestamp}_{thread_id:?}");
    let store = SqliteStore::new(&db_name).await.unwrap();
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
async fn migrations_run_cleanly_against_a_fresh_database() {
    let store = create_test_store().await;
    assert!(store.health_check().await.is_ok());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_items, 0);
}

#[tokio::test]
async fn full_item_lifecycle_through_role_transitions() {
    let store = create_test_store().await;
    let workflow = WorkflowConfig::default_bundled();

    let item = store
        .create_item(
            NewWorkItem {
                parent_id: None,
                title: "Ship the release".to_string(),
                description: Some("cut v1.0".to_string()),
                tags: vec!["release".to_string()],
                priority: Priority::High,
                status: Some("pending".to_string()),
            },
            &workflow,
        )
        .await
        .unwrap();
    assert_eq!(item.role, Role::Queue);

    let [started] = store
        .apply_transitions(vec![PendingTransition {
            item_id: item.id,
            expected_status: "pending".to_string(),
            new_status: "coding".to_string(),
            new_role: Role::Work,
            trigger: Trigger::Start,
            actor: Some("agent-1".to_string()),
        }])
        .await
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(started.role, Role::Work);
    assert_eq!(started.previous_role, Some(Role::Queue));

    let [done] = store
        .apply_transitions(vec![PendingTransition {
            item_id: item.id,
            expected_status: "coding".to_string(),
            new_status: "done".to_string(),
            new_role: Role::Terminal,
            trigger: Trigger::Complete,
            actor: Some("agent-1".to_string()),
        }])
        .await
        .unwrap()
        .try_into()
        .unwrap();
    assert_eq!(done.status, "done");

    let log = store.transitions_by_item(item.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].trigger, Trigger::Start);
    assert_eq!(log[1].trigger, Trigger::Complete);
}

#[tokio::test]
async fn concurrent_transition_attempts_on_the_same_item_only_one_wins() {
    let store = Arc::new(create_test_store().await);
    let workflow = WorkflowConfig::default_bundled();

    let item = store
        .create_item(
            NewWorkItem {
                parent_id: None,
                title: "Contended item".to_string(),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: Some("pending".to_string()),
            },
            &workflow,
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        let item_id = item.id;
        handles.push(tokio::spawn(async move {
            store
                .apply_transitions(vec![PendingTransition {
                    item_id,
                    expected_status: "pending".to_string(),
                    new_status: "coding".to_string(),
                    new_role: Role::Work,
                    trigger: Trigger::Start,
                    actor: Some(format!("agent-{i}")),
                }])
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "exactly one racing transition should win the compare-and-swap");

    let final_item = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(final_item.status, "coding");

    let log = store.transitions_by_item(item.id).await.unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn deleting_a_subtree_cascades_notes_and_dependencies() {
    let store = create_test_store().await;
    let workflow = WorkflowConfig::default_bundled();

    let parent = store
        .create_item(
            NewWorkItem {
                parent_id: None,
                title: "parent".to_string(),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: None,
            },
            &workflow,
        )
        .await
        .unwrap();
    let child = store
        .create_item(
            NewWorkItem {
                parent_id: Some(parent.id),
                title: "child".to_string(),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: None,
            },
            &workflow,
        )
        .await
        .unwrap();
    let other = store
        .create_item(
            NewWorkItem {
                parent_id: None,
                title: "other".to_string(),
                description: None,
                tags: vec![],
                priority: Priority::Medium,
                status: None,
            },
            &workflow,
        )
        .await
        .unwrap();

    store
        .upsert_note(database::UpsertNote {
            item_id: child.id,
            key: "progress".to_string(),
            phase: Role::Queue,
            body: "started".to_string(),
        })
        .await
        .unwrap();
    store
        .create_dependency(database::NewDependency {
            from_item_id: child.id,
            to_item_id: other.id,
            dep_type: database::DependencyType::Blocks,
        })
        .await
        .unwrap();

    store.delete_item(parent.id, true).await.unwrap();

    assert!(store.notes_by_item(child.id).await.unwrap().is_empty());
    assert!(store.dependencies_by_from_item(child.id).await.unwrap().is_empty());
    assert!(store.dependencies_by_to_item(other.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_items_respects_limit_and_offset() {
    let store = create_test_store().await;
    let workflow = WorkflowConfig::default_bundled();

    for i in 0..5 {
        store
            .create_item(
                NewWorkItem {
                    parent_id: None,
                    title: format!("item-{i}"),
                    description: None,
                    tags: vec![],
                    priority: Priority::Medium,
                    status: None,
                },
                &workflow,
            )
            .await
            .unwrap();
    }

    let page = store
        .query_items(database::ItemFilter {
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}
