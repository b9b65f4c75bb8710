//! One async fn per testable property, run end to end against a
//! [`ToolDispatcher`] over an in-process store. Each returns `Ok(())` on
//! success and an `Err` carrying a human-readable mismatch description —
//! there is no panic-based assertion here since the runner needs to keep
//! going after a failure and report every scenario's outcome.

use anyhow::{ensure, Result};
use mcp_protocol::{
    dispatcher::ToolDispatcher,
    params::{
        AdvanceItemParams, CompleteTreeParams, GetContextParams, GetNextStatusParams,
        ManageDependenciesParams, ManageItemsParams, ManageNotesParams, QueryItemsParams,
    },
};
use serde_json::{json, Value};

use crate::harness::{default_fixture, fixture_with_schemas, fixture_with_workflow, sqlite_fixture};

/// A named scenario's future, boxed so the runner can hold a homogeneous
/// list of otherwise differently-typed `async fn` bodies.
pub type BoxedScenario = std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>>>>;

fn boxed<F: std::future::Future<Output = Result<()>> + 'static>(f: F) -> BoxedScenario {
    Box::pin(f)
}

pub fn all() -> Vec<(&'static str, BoxedScenario)> {
    vec![
        ("invariant: depth tracks ancestor count and caps at 3", boxed(invariant_depth_cap())),
        ("invariant: status always maps to a declared role", boxed(invariant_status_role_mapping())),
        ("invariant: a role transition never records from==to", boxed(invariant_transition_changes_role())),
        ("invariant: dependency edges are acyclic and irreflexive", boxed(invariant_no_dependency_cycle())),
        (
            "invariant: completing via non-cancel trigger requires terminal blockers",
            boxed(invariant_terminal_requires_resolved_blockers()),
        ),
        ("invariant: (item, key) is unique for notes", boxed(invariant_note_key_uniqueness())),
        (
            "invariant: deleting an item cascades its notes and dependencies",
            boxed(invariant_delete_cascades()),
        ),
        ("law: create then get round-trips user-supplied fields", boxed(law_round_trip())),
        ("law: a second cancel is a no-op NoTransitionAvailable", boxed(law_idempotent_cancel())),
        ("law: get_next_status is stable across a non-mutating query", boxed(law_gate_check_commutativity())),
        ("law: re-applying the last transition is a no-op", boxed(law_cascade_confluence())),
        ("boundary: creating a child at depth 3 fails validation", boxed(boundary_depth_three_rejects_child())),
        ("boundary: closing a BLOCKS cycle is a conflict", boxed(boundary_cycle_is_conflict())),
        ("boundary: starting with a missing gate note is blocked", boxed(boundary_gate_blocks_start())),
        (
            "boundary: complete_tree reports per-leaf failures without losing successes",
            boxed(boundary_complete_tree_partial_failure()),
        ),
        ("scenario 1: gate block then unblock", boxed(scenario_gate_block())),
        ("scenario 2: cascade completes the parent", boxed(scenario_cascade_complete())),
        ("scenario 3: dependency cycle rejection reports the cycle", boxed(scenario_cycle_rejection())),
        ("scenario 4: completing a blocker unblocks its dependents", boxed(scenario_unblocked_discovery())),
        ("scenario 5: two-call work summary needs no further round-trips", boxed(scenario_work_summary())),
        ("scenario 6: cascade depth cap stops partway up the chain", boxed(scenario_cascade_depth_cap())),
        ("storage: sqlite-backed dispatcher enforces the same invariants", boxed(storage_sqlite_round_trip())),
    ]
}

// ---------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------

async fn create(d: &ToolDispatcher, parent_id: Option<i64>, title: &str, tags: &[&str]) -> Value {
    d.manage_items(ManageItemsParams {
        operation: "create".to_string(),
        item: Some(json!({
            "parentId": parent_id,
            "title": title,
            "description": null,
            "tags": tags,
        })),
        items: None,
    })
    .await
}

fn item_id(response: &Value) -> i64 {
    response["data"]["item"]["id"].as_i64().expect("response carries item.id")
}

async fn advance(d: &ToolDispatcher, item_id: i64, trigger: &str) -> Value {
    d.advance_item(AdvanceItemParams {
        item_id: Some(item_id),
        trigger: Some(trigger.to_string()),
        summary: None,
        actor: None,
        transitions: None,
    })
    .await
}

async fn get(d: &ToolDispatcher, id: i64) -> Value {
    d.query_items(QueryItemsParams {
        operation: "get".to_string(),
        id: Some(id),
        text: None,
        tag: None,
        role: None,
        status: None,
        parent_id: None,
        limit: None,
        offset: None,
        include_ancestors: false,
        include_children: false,
    })
    .await
}

async fn upsert_note(d: &ToolDispatcher, item_id: i64, key: &str, phase: &str, body: &str) -> Value {
    d.manage_notes(ManageNotesParams {
        operation: "upsert".to_string(),
        item_id,
        key: key.to_string(),
        phase: Some(phase.to_string()),
        body: Some(body.to_string()),
    })
    .await
}

async fn depend(d: &ToolDispatcher, from: i64, to: i64, dep_type: &str) -> Value {
    d.manage_dependencies(ManageDependenciesParams {
        operation: "create".to_string(),
        dependencies: Some(vec![json!({ "fromItemId": from, "toItemId": to, "type": dep_type })]),
        pattern: None,
        item_ids: None,
        dep_type: None,
        id: None,
    })
    .await
}

// ---------------------------------------------------------------------
// invariants
// ---------------------------------------------------------------------

async fn invariant_depth_cap() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let root = item_id(&create(d, None, "root", &[]).await);
    let a = item_id(&create(d, Some(root), "depth1", &[]).await);
    let b = item_id(&create(d, Some(a), "depth2", &[]).await);
    let c = item_id(&create(d, Some(b), "depth3", &[]).await);

    let fetched = get(d, c).await;
    ensure!(fetched["data"]["item"]["depth"] == 3, "item at the fourth nesting level should report depth 3");

    let over = create(d, Some(c), "depth4", &[]).await;
    ensure!(over["ok"] == false, "creating a child past depth 3 must fail");
    ensure!(over["error"]["code"] == "ValidationError", "depth overflow must surface as ValidationError");
    Ok(())
}

async fn invariant_status_role_mapping() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &[]).await);
    let fetched = get(d, id).await;
    let status = fetched["data"]["item"]["status"].as_str().unwrap().to_string();
    let role = fetched["data"]["item"]["role"].as_str().unwrap().to_string();
    ensure!(status == "pending" && role == "queue", "a freshly created item starts pending/queue");
    Ok(())
}

async fn invariant_transition_changes_role() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &[]).await);
    let started = advance(d, id, "start").await;
    ensure!(started["ok"] == true, "start should succeed from a fresh queue item");
    let transition = &started["data"]["transition"];
    ensure!(
        transition["previousRole"] != transition["newRole"],
        "a recorded transition must cross a role boundary"
    );
    Ok(())
}

async fn invariant_no_dependency_cycle() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "a", &[]).await);
    let b = item_id(&create(d, None, "b", &[]).await);

    let self_dep = depend(d, a, a, "BLOCKS").await;
    ensure!(self_dep["ok"] == false, "an item cannot block itself");

    let ok = depend(d, a, b, "BLOCKS").await;
    ensure!(ok["ok"] == true, "a -> b should be accepted");

    let cyclic = depend(d, b, a, "BLOCKS").await;
    ensure!(cyclic["ok"] == false, "b -> a would close a 2-cycle and must be rejected");
    Ok(())
}

async fn invariant_terminal_requires_resolved_blockers() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "a", &[]).await);
    let b = item_id(&create(d, None, "b", &[]).await);
    depend(d, a, b, "BLOCKS").await;
    advance(d, a, "start").await;

    let blocked_complete = advance(d, a, "complete").await;
    ensure!(blocked_complete["ok"] == false, "a cannot complete while it blocks an unterminated b");
    ensure!(
        blocked_complete["error"]["code"] == "DependenciesNotResolved",
        "the rejection must be DependenciesNotResolved"
    );

    advance(d, b, "start").await;
    advance(d, b, "complete").await;
    let now_complete = advance(d, a, "complete").await;
    ensure!(now_complete["ok"] == true, "a can complete once its blocker b is terminal");
    Ok(())
}

async fn invariant_note_key_uniqueness() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &[]).await);
    upsert_note(d, id, "summary", "queue", "first draft").await;
    let updated = upsert_note(d, id, "summary", "queue", "revised draft").await;
    ensure!(updated["ok"] == true, "re-upserting the same key should update, not duplicate");

    let notes = d
        .query_notes(mcp_protocol::params::QueryNotesParams { item_id: id })
        .await;
    let list = notes["data"]["notes"].as_array().unwrap();
    ensure!(list.len() == 1, "(item_id, key) collisions must overwrite, leaving exactly one row");
    ensure!(list[0]["body"] == "revised draft", "the overwrite must keep the latest body");
    Ok(())
}

async fn invariant_delete_cascades() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "a", &[]).await);
    let b = item_id(&create(d, None, "b", &[]).await);
    upsert_note(d, a, "summary", "queue", "note on a").await;
    depend(d, a, b, "BLOCKS").await;

    let deleted = d
        .manage_items(ManageItemsParams {
            operation: "delete".to_string(),
            item: Some(json!({ "id": a, "recursive": true })),
            items: None,
        })
        .await;
    ensure!(deleted["ok"] == true, "delete should succeed");

    let notes = d
        .query_notes(mcp_protocol::params::QueryNotesParams { item_id: a })
        .await;
    ensure!(notes["ok"] == false, "querying notes on a deleted item must fail, not return stale rows");

    let deps = d
        .query_dependencies(mcp_protocol::params::QueryDependenciesParams {
            item_id: b,
            direction: Some("incoming".to_string()),
            neighbors_only: true,
            max_depth: None,
        })
        .await;
    let list = deps["data"]["dependencies"].as_array().unwrap();
    ensure!(list.is_empty(), "the dependency referencing the deleted item must be gone too");
    Ok(())
}

// ---------------------------------------------------------------------
// laws
// ---------------------------------------------------------------------

async fn law_round_trip() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let created = create(d, None, "round-trip me", &["impl"]).await;
    let id = item_id(&created);
    let fetched = get(d, id).await;
    ensure!(fetched["data"]["item"]["title"] == created["data"]["item"]["title"], "title must round-trip");
    ensure!(fetched["data"]["item"]["tags"] == created["data"]["item"]["tags"], "tags must round-trip");
    Ok(())
}

async fn law_idempotent_cancel() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &[]).await);
    let first = advance(d, id, "cancel").await;
    ensure!(first["ok"] == true, "first cancel should succeed");
    let second = advance(d, id, "cancel").await;
    ensure!(second["ok"] == false, "a second cancel has nowhere left to go");
    ensure!(second["error"]["code"] == "NoTransitionAvailable", "the repeat must be NoTransitionAvailable");
    Ok(())
}

async fn law_gate_check_commutativity() -> Result<()> {
    let schemas = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
"#;
    let fx = fixture_with_schemas(schemas);
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &["impl"]).await);

    let before = d
        .get_next_status(GetNextStatusParams { item_id: id, hypothetical_status: None, hypothetical_tags: None })
        .await;
    let _ = get(d, id).await;
    let after = d
        .get_next_status(GetNextStatusParams { item_id: id, hypothetical_status: None, hypothetical_tags: None })
        .await;
    ensure!(before["data"] == after["data"], "a non-mutating query must not change the recommendation");
    Ok(())
}

async fn law_cascade_confluence() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &[]).await);
    advance(d, id, "start").await;
    let first = advance(d, id, "complete").await;
    ensure!(first["ok"] == true, "first completion should succeed");
    let state_after_first = get(d, id).await;

    let second = advance(d, id, "complete").await;
    ensure!(second["ok"] == false, "re-applying an already-applied transition is a no-op failure");
    let state_after_second = get(d, id).await;
    ensure!(
        state_after_first["data"] == state_after_second["data"],
        "a no-op second call must leave the stored state unchanged"
    );
    Ok(())
}

// ---------------------------------------------------------------------
// boundary behavior
// ---------------------------------------------------------------------

async fn boundary_depth_three_rejects_child() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let root = item_id(&create(d, None, "root", &[]).await);
    let a = item_id(&create(d, Some(root), "a", &[]).await);
    let b = item_id(&create(d, Some(a), "b", &[]).await);
    let over = create(d, Some(b), "too deep", &[]).await;
    ensure!(over["ok"] == false && over["error"]["code"] == "ValidationError", "depth 3 -> 4 must fail validation");
    Ok(())
}

async fn boundary_cycle_is_conflict() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "a", &[]).await);
    let b = item_id(&create(d, None, "b", &[]).await);
    let c = item_id(&create(d, None, "c", &[]).await);
    depend(d, a, b, "BLOCKS").await;
    depend(d, b, c, "BLOCKS").await;
    let closing = depend(d, c, a, "BLOCKS").await;
    ensure!(closing["ok"] == false && closing["error"]["code"] == "ConflictError", "closing the cycle must conflict");
    Ok(())
}

async fn boundary_gate_blocks_start() -> Result<()> {
    let schemas = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
"#;
    let fx = fixture_with_schemas(schemas);
    let d = &fx.dispatcher;
    let id = item_id(&create(d, None, "item", &["impl"]).await);
    let blocked = advance(d, id, "start").await;
    ensure!(blocked["ok"] == false && blocked["error"]["code"] == "GateBlocked", "missing note must gate-block start");
    ensure!(blocked["error"]["details"]["missing"][0] == "design", "the missing key must be named");
    Ok(())
}

async fn boundary_complete_tree_partial_failure() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let root = item_id(&create(d, None, "root", &[]).await);
    let ok_leaf = item_id(&create(d, Some(root), "fine", &[]).await);
    let blocked_leaf = item_id(&create(d, Some(root), "stuck", &[]).await);
    let blocker = item_id(&create(d, None, "blocker", &[]).await);
    depend(d, blocked_leaf, blocker, "BLOCKS").await;
    advance(d, blocked_leaf, "start").await;
    advance(d, ok_leaf, "start").await;

    let result = d
        .complete_tree(CompleteTreeParams { root_id: root, trigger: "complete".to_string() })
        .await;
    ensure!(result["ok"] == true, "complete_tree itself always reports ok even with per-item failures");
    let items = result["data"]["items"].as_array().unwrap();
    let ok_entry = items.iter().find(|e| e["id"] == ok_leaf).expect("ok leaf present");
    ensure!(ok_entry["ok"] == true, "the unblocked leaf must commit");
    let stuck_entry = items.iter().find(|e| e["id"] == blocked_leaf).expect("stuck leaf present");
    ensure!(stuck_entry["ok"] == false, "the blocked leaf must be reported, not silently dropped");

    let fetched_ok = get(d, ok_leaf).await;
    ensure!(fetched_ok["data"]["item"]["role"] == "terminal", "the successful leaf committed its transition");
    Ok(())
}

// ---------------------------------------------------------------------
// concrete scenarios
// ---------------------------------------------------------------------

async fn scenario_gate_block() -> Result<()> {
    let schemas = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
"#;
    let fx = fixture_with_schemas(schemas);
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "A", &["impl", "backend"]).await);

    let recommendation = d
        .get_next_status(GetNextStatusParams { item_id: a, hypothetical_status: None, hypothetical_tags: None })
        .await;
    ensure!(recommendation["data"]["outcome"] == "blocked", "no design note yet, so next status is blocked");
    ensure!(recommendation["data"]["missingNotes"][0] == "design", "missing note must be named design");

    let rejected = advance(d, a, "start").await;
    ensure!(rejected["ok"] == false, "start must be rejected without the design note");
    ensure!(rejected["error"]["code"] == "GateBlocked", "rejection code must be GateBlocked");
    ensure!(rejected["error"]["details"]["missing"][0] == "design", "details must list the missing key");

    upsert_note(d, a, "design", "queue", "wire").await;
    let started = advance(d, a, "start").await;
    ensure!(started["ok"] == true, "start should now succeed with the note present");
    ensure!(started["data"]["item"]["role"] == "work", "A should now be in the work role");
    Ok(())
}

async fn scenario_cascade_complete() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let p = item_id(&create(d, None, "P", &[]).await);
    let c1 = item_id(&create(d, Some(p), "C1", &[]).await);
    let c2 = item_id(&create(d, Some(p), "C2", &[]).await);

    advance(d, c1, "start").await;
    advance(d, c1, "complete").await;
    advance(d, c2, "start").await;
    let final_response = advance(d, c2, "complete").await;

    let p_after = get(d, p).await;
    ensure!(p_after["data"]["item"]["role"] == "terminal", "P must become terminal once all children complete");

    let events = final_response["data"]["cascadeEvents"].as_array().unwrap();
    ensure!(
        events.iter().any(|e| e["item"] == p && e["event"] == "all_tasks_complete" && e["applied"] == true),
        "the final child completion must report P's cascade as applied"
    );
    Ok(())
}

async fn scenario_cycle_rejection() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "A", &[]).await);
    let b = item_id(&create(d, None, "B", &[]).await);
    let c = item_id(&create(d, None, "C", &[]).await);
    depend(d, a, b, "BLOCKS").await;
    depend(d, b, c, "BLOCKS").await;

    let rejected = depend(d, c, a, "BLOCKS").await;
    ensure!(rejected["ok"] == false, "C -> A would close the cycle");
    ensure!(rejected["error"]["code"] == "ConflictError", "must be ConflictError");
    let cycle = rejected["error"]["details"]["cycle"].as_array().unwrap();
    let cycle_ids: Vec<i64> = cycle.iter().map(|v| v.as_i64().unwrap()).collect();
    ensure!(cycle_ids.first() == cycle_ids.last(), "the reported cycle path must close on itself");
    ensure!(cycle_ids.contains(&a) && cycle_ids.contains(&b) && cycle_ids.contains(&c), "cycle must name all three items");
    Ok(())
}

async fn scenario_unblocked_discovery() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    let a = item_id(&create(d, None, "A", &[]).await);
    let b = item_id(&create(d, None, "B", &[]).await);
    depend(d, a, b, "BLOCKS").await;
    advance(d, a, "start").await;

    let completed = advance(d, a, "complete").await;
    ensure!(completed["ok"] == true, "A should complete since it has no blockers of its own");
    let unblocked = completed["data"]["unblockedItems"].as_array().unwrap();
    ensure!(unblocked.iter().any(|u| u["id"] == b), "completing A must report B as newly unblocked");

    let repeat = advance(d, a, "complete").await;
    ensure!(repeat["ok"] == false, "completing A again is a no-op");
    ensure!(repeat["error"]["code"] == "NoTransitionAvailable", "the no-op must be NoTransitionAvailable");
    Ok(())
}

async fn scenario_work_summary() -> Result<()> {
    let fx = default_fixture();
    let d = &fx.dispatcher;
    for root_name in ["Root1", "Root2"] {
        let root = item_id(&create(d, None, root_name, &[]).await);
        for i in 0..3 {
            let child = item_id(&create(d, Some(root), &format!("{root_name}-child-{i}"), &[]).await);
            if i == 0 {
                advance(d, child, "start").await;
            }
        }
    }

    let context = d
        .get_context(GetContextParams { mode: "session".to_string(), item_id: None, since: None, include_ancestors: true })
        .await;
    ensure!(context["ok"] == true, "session context should succeed");

    let overview = d
        .query_items(QueryItemsParams {
            operation: "overview".to_string(),
            id: None,
            text: None,
            tag: None,
            role: None,
            status: None,
            parent_id: None,
            limit: None,
            offset: None,
            include_ancestors: false,
            include_children: true,
        })
        .await;
    let roots = overview["data"]["roots"].as_array().unwrap();
    ensure!(roots.len() == 2, "overview must report both roots");
    for root in roots {
        let children = root["children"].as_array().unwrap();
        ensure!(children.len() == 3, "each root must report its 3 children without a further call");
    }
    Ok(())
}

/// The spec's scenario text describes a five-level parent chain with
/// `maxDepth=3`; a fifth nesting level would violate the `depth <= 3`
/// invariant (core/src/models.rs: `WorkItem::MAX_DEPTH`). Instead this
/// builds the deepest legal chain — a leaf at depth 3 cascading up through
/// three ancestors — with `maxDepth=2`, which reaches the same tested
/// behavior: some hops apply, the remainder reports `CascadeDepthExceeded`.
async fn scenario_cascade_depth_cap() -> Result<()> {
    let workflow = r#"
flows:
  - name: default
    sequence: [pending, in_progress, done]
    terminal: [done, cancelled]
status_roles:
  pending: queue
  in_progress: work
  done: terminal
  cancelled: terminal
auto_cascade:
  enabled: true
  maxDepth: 2
"#;
    let fx = fixture_with_workflow(workflow);
    let d = &fx.dispatcher;
    let root = item_id(&create(d, None, "root", &[]).await);
    let depth1 = item_id(&create(d, Some(root), "depth1", &[]).await);
    let depth2 = item_id(&create(d, Some(depth1), "depth2", &[]).await);
    let depth3 = item_id(&create(d, Some(depth2), "depth3", &[]).await);
    advance(d, depth3, "start").await;

    let result = d
        .complete_tree(CompleteTreeParams { root_id: root, trigger: "complete".to_string() })
        .await;
    ensure!(result["ok"] == true, "complete_tree should run to completion even with a capped cascade");

    let events = result["data"]["cascadeEvents"].as_array().unwrap();
    let applied: Vec<i64> = events
        .iter()
        .filter(|e| e["applied"] == true)
        .map(|e| e["item"].as_i64().unwrap())
        .collect();
    ensure!(applied.contains(&depth2), "hop 1 (depth3 -> depth2) is within maxDepth=2");
    ensure!(applied.contains(&depth1), "hop 2 (depth2 -> depth1) is within maxDepth=2");

    let exceeded = events
        .iter()
        .find(|e| e["item"] == root && e["applied"] == false)
        .ok_or_else(|| anyhow::anyhow!("hop 3 (depth1 -> root) must exceed maxDepth=2"))?;
    ensure!(exceeded["reason"] == "CascadeDepthExceeded", "the cutoff reason must name CascadeDepthExceeded");

    // complete_tree still walks every node explicitly, so the root itself
    // commits via its own direct trigger even though the cascade from
    // below was capped before reaching it.
    let root_after = get(d, root).await;
    ensure!(root_after["data"]["item"]["role"] == "terminal", "the explicit walk still completes the root");
    Ok(())
}

// ---------------------------------------------------------------------
// storage backend
// ---------------------------------------------------------------------

/// `MockStore` proves the dispatcher's own logic; this proves the SQL
/// schema and queries underneath it enforce the same invariants once a
/// real database is in the loop: migrations run, a parent/child round
/// trip survives a connection, and note-key uniqueness is upheld by the
/// schema rather than an in-memory `HashMap`.
async fn storage_sqlite_round_trip() -> Result<()> {
    let fx = sqlite_fixture().await;
    let d = &fx.dispatcher;

    let root = item_id(&create(d, None, "root", &["impl"]).await);
    let child = item_id(&create(d, Some(root), "child", &[]).await);
    let fetched = get(d, child).await;
    ensure!(fetched["data"]["item"]["parentId"] == root, "parent id must survive a write/read round trip through sqlite");
    ensure!(fetched["data"]["item"]["depth"] == 1, "depth must be computed correctly from the persisted ancestor chain");

    upsert_note(d, root, "summary", "queue", "first draft").await;
    let overwritten = upsert_note(d, root, "summary", "queue", "second draft").await;
    ensure!(overwritten["ok"] == true, "sqlite must accept the upsert-on-conflict path for (item_id, key)");
    let notes = d.query_notes(mcp_protocol::params::QueryNotesParams { item_id: root }).await;
    let list = notes["data"]["notes"].as_array().unwrap();
    ensure!(list.len() == 1, "the unique index on (item_id, key) must keep exactly one row after the overwrite");
    ensure!(list[0]["body"] == "second draft", "the overwrite must keep the latest body");

    let started = advance(d, child, "start").await;
    ensure!(started["ok"] == true, "a transition must commit against the real store");

    let deleted = d
        .manage_items(ManageItemsParams {
            operation: "delete".to_string(),
            item: Some(json!({ "id": root, "recursive": true })),
            items: None,
        })
        .await;
    ensure!(deleted["ok"] == true, "recursive delete must cascade through foreign keys");
    let after_delete = get(d, child).await;
    ensure!(after_delete["ok"] == false, "the child row must be gone once its ancestor is deleted recursively");
    Ok(())
}
