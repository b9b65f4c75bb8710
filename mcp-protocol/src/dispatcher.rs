//! The 13-tool business logic. One public async method per tool, each
//! returning the uniform response envelope directly — never a `Result`,
//! since a `GateBlocked` or `NotFound` is itself a valid, expected outcome
//! the caller must see, not a failure of the call itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use work_item_core::cascade::CascadeEngine;
use work_item_core::error::{Result as CoreResult, WorkItemError};
use work_item_core::graph::{Direction, GraphService};
use work_item_core::models::{
    DependencyType, ItemFilter, NewDependency, NewWorkItem, Priority, Role, Trigger,
    UpdateWorkItem, UpsertNote, WorkItem,
};
use work_item_core::note_schema::NoteSchemaService;
use work_item_core::store::{Store, StoreStats};
use work_item_core::workflow::{Recommendation, WorkflowEngine};

use crate::config_cache::ConfigCache;
use crate::error::{conflict_with_cycle, map_error, ToolError};
use crate::params::*;
use crate::response;
use crate::validate;

pub struct ToolDispatcher {
    store: Arc<dyn Store>,
    config: Arc<ConfigCache>,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn Store>, config: Arc<ConfigCache>) -> Self {
        Self { store, config }
    }

    fn configs(&self) -> (work_item_core::config::WorkflowConfig, work_item_core::config::NoteSchemaConfig) {
        self.config.get()
    }

    // -------------------------------------------------------------
    // manage_items / query_items
    // -------------------------------------------------------------

    pub async fn manage_items(&self, params: ManageItemsParams) -> Value {
        if !matches!(params.operation.as_str(), "create" | "update" | "delete") {
            return response::failure_from(&unknown_operation(&params.operation));
        }
        if let Some(items) = params.items {
            let mut results = Vec::new();
            for (i, payload) in items.into_iter().enumerate() {
                let result = self.manage_items_one(&params.operation, payload).await;
                results.push(response::batch_entry(i, result));
            }
            return response::batch_success(results);
        }
        let Some(payload) = params.item else {
            return response::failure_from(&WorkItemError::Validation(
                "either 'item' or 'items' is required".to_string(),
            ));
        };
        match self.manage_items_one(&params.operation, payload).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn manage_items_one(&self, operation: &str, payload: Value) -> CoreResult<Value> {
        match operation {
            "create" => self.create_item(payload).await,
            "update" => self.update_item(payload).await,
            "delete" => self.delete_item(payload).await,
            other => Err(unknown_operation(other)),
        }
    }

    async fn create_item(&self, payload: Value) -> CoreResult<Value> {
        let new_item: NewWorkItem = serde_json::from_value(payload)
            .map_err(|e| WorkItemError::Validation(format!("invalid item payload: {e}")))?;
        validate::validate_new_item(&new_item)?;
        let (workflow, schemas) = self.configs();
        let item = self.store.create_item(new_item, &workflow).await?;
        let schema_service = NoteSchemaService::new(self.store.as_ref(), &schemas);
        let expected = schema_service.expected_notes(&item).await?;
        Ok(json!({ "item": item, "expectedNotes": expected }))
    }

    async fn update_item(&self, payload: Value) -> CoreResult<Value> {
        let id = extract_id(&payload)?;
        let updates: UpdateWorkItem = serde_json::from_value(payload)
            .map_err(|e| WorkItemError::Validation(format!("invalid item payload: {e}")))?;
        if let Some(Some(new_parent)) = updates.parent_id {
            let graph = GraphService::new(self.store.as_ref());
            if graph.would_introduce_parent_cycle(id, new_parent).await? {
                return Err(WorkItemError::Conflict(format!(
                    "reparenting item {id} under {new_parent} would introduce a cycle"
                )));
            }
        }
        let item = self.store.update_item(id, updates).await?;
        Ok(json!({ "item": item }))
    }

    async fn delete_item(&self, payload: Value) -> CoreResult<Value> {
        let id = extract_id(&payload)?;
        let recursive = payload.get("recursive").and_then(Value::as_bool).unwrap_or(false);
        let deleted = self.store.delete_item(id, recursive).await?;
        Ok(json!({ "deleted": deleted }))
    }

    pub async fn query_items(&self, params: QueryItemsParams) -> Value {
        let result = match params.operation.as_str() {
            "get" => self.query_get(&params).await,
            "search" => self.query_search(&params).await,
            "overview" => self.query_overview(&params).await,
            other => Err(unknown_operation(other)),
        };
        match result {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn query_get(&self, params: &QueryItemsParams) -> CoreResult<Value> {
        let id = params
            .id
            .ok_or_else(|| WorkItemError::Validation("'id' is required for get".to_string()))?;
        let item = self.store.get_item(id).await?.ok_or_else(|| WorkItemError::item_not_found(id))?;
        let mut data = json!({ "item": item });
        if params.include_ancestors {
            let graph = GraphService::new(self.store.as_ref());
            let ancestors = graph.ancestors(id).await?;
            data["ancestors"] = ancestors_json(&ancestors);
        }
        Ok(data)
    }

    async fn query_search(&self, params: &QueryItemsParams) -> CoreResult<Value> {
        let role = params.role.as_deref().map(validate::parse_role).transpose()?;
        let filter = ItemFilter {
            parent_id: params.parent_id.map(Some),
            role,
            status: params.status.clone(),
            tag: params.tag.clone(),
            text: params.text.clone(),
            limit: params.limit,
            offset: params.offset,
        };
        let items = self.store.query_items(filter).await?;
        Ok(json!({ "items": items }))
    }

    async fn query_overview(&self, params: &QueryItemsParams) -> CoreResult<Value> {
        let roots = self.store.items_by_parent(None).await?;
        let stats = self.store.stats().await?;
        let graph = GraphService::new(self.store.as_ref());
        let mut root_entries = Vec::new();
        for root in &roots {
            let mut entry = json!({
                "id": root.id,
                "title": root.title,
                "role": root.role,
                "status": root.status,
            });
            if params.include_children {
                let descendants = graph.descendants(root.id, None).await?;
                entry["children"] = json!(descendants
                    .into_iter()
                    .map(|d| json!({
                        "id": d.id,
                        "title": d.title,
                        "role": d.role,
                        "depth": d.depth - root.depth,
                    }))
                    .collect::<Vec<_>>());
            }
            root_entries.push(entry);
        }
        Ok(json!({ "roots": root_entries, "stats": stats_to_json(&stats) }))
    }

    // -------------------------------------------------------------
    // manage_notes / query_notes
    // -------------------------------------------------------------

    pub async fn manage_notes(&self, params: ManageNotesParams) -> Value {
        let result = match params.operation.as_str() {
            "upsert" => self.upsert_note(&params).await,
            "delete" => match self.store.delete_note(params.item_id, &params.key).await {
                Ok(()) => Ok(json!({ "itemId": params.item_id, "key": params.key })),
                Err(e) => Err(e),
            },
            other => Err(unknown_operation(other)),
        };
        match result {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn upsert_note(&self, params: &ManageNotesParams) -> CoreResult<Value> {
        let phase_str = params
            .phase
            .as_deref()
            .ok_or_else(|| WorkItemError::Validation("'phase' is required for upsert".to_string()))?;
        let phase = validate::parse_role(phase_str)?;
        let body = params
            .body
            .clone()
            .ok_or_else(|| WorkItemError::Validation("'body' is required for upsert".to_string()))?;
        let upsert = UpsertNote { item_id: params.item_id, key: params.key.clone(), phase, body };
        validate::validate_upsert_note(&upsert)?;
        let note = self.store.upsert_note(upsert).await?;
        Ok(json!({ "note": note }))
    }

    pub async fn query_notes(&self, params: QueryNotesParams) -> Value {
        match self.query_notes_inner(&params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn query_notes_inner(&self, params: &QueryNotesParams) -> CoreResult<Value> {
        let item = self
            .store
            .get_item(params.item_id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(params.item_id))?;
        let notes = self.store.notes_by_item(params.item_id).await?;
        let (_, schemas) = self.configs();
        let schema_service = NoteSchemaService::new(self.store.as_ref(), &schemas);
        let expected = schema_service.expected_notes(&item).await?;
        Ok(json!({ "notes": notes, "expectedNotes": expected }))
    }

    // -------------------------------------------------------------
    // manage_dependencies / query_dependencies
    // -------------------------------------------------------------

    pub async fn manage_dependencies(&self, params: ManageDependenciesParams) -> Value {
        match params.operation.as_str() {
            "create" => self.create_dependencies(params).await,
            "delete" => {
                let Some(id) = params.id else {
                    return response::failure_from(&WorkItemError::Validation(
                        "'id' is required for delete".to_string(),
                    ));
                };
                match self.store.delete_dependency(id).await {
                    Ok(()) => response::success(json!({ "deletedId": id })),
                    Err(e) => response::failure_from(&e),
                }
            }
            other => response::failure_from(&unknown_operation(other)),
        }
    }

    async fn create_dependencies(&self, params: ManageDependenciesParams) -> Value {
        let edges = match expand_dependency_request(&params) {
            Ok(e) => e,
            Err(e) => return response::failure_from(&e),
        };
        if edges.is_empty() {
            return response::failure_from(&WorkItemError::Validation(
                "no dependency edges given".to_string(),
            ));
        }
        if edges.len() == 1 {
            return match self.try_create_dependency(edges.into_iter().next().unwrap()).await {
                Ok(data) => response::success(data),
                Err(tool_err) => response::failure(&tool_err),
            };
        }
        let mut results = Vec::new();
        for (i, edge) in edges.into_iter().enumerate() {
            let entry = match self.try_create_dependency(edge).await {
                Ok(data) => json!({ "index": i, "ok": true, "data": data }),
                Err(tool_err) => json!({ "index": i, "ok": false, "error": tool_err }),
            };
            results.push(entry);
        }
        response::batch_success(results)
    }

    async fn try_create_dependency(&self, edge: NewDependency) -> Result<Value, ToolError> {
        validate::validate_new_dependency(&edge).map_err(|e| map_error(&e))?;
        let graph = GraphService::new(self.store.as_ref());
        let cycles = graph
            .would_introduce_dependency_cycle(edge.from_item_id, edge.to_item_id, edge.dep_type)
            .await
            .map_err(|e| map_error(&e))?;
        if cycles {
            let cycle = self
                .reconstruct_cycle(edge.from_item_id, edge.to_item_id, edge.dep_type)
                .await
                .unwrap_or_default();
            return Err(conflict_with_cycle(
                "creating this dependency would introduce a cycle",
                cycle,
            ));
        }
        let dep = self.store.create_dependency(edge).await.map_err(|e| map_error(&e))?;
        Ok(json!({ "dependency": dep }))
    }

    /// Best-effort reconstruction of the cycle a rejected edge would close,
    /// for the `details.cycle` field. Walks BLOCKS-forward edges from the
    /// edge's effective target back to its effective source.
    async fn reconstruct_cycle(
        &self,
        from_id: i64,
        to_id: i64,
        dep_type: DependencyType,
    ) -> CoreResult<Vec<i64>> {
        if dep_type == DependencyType::RelatesTo {
            return Ok(vec![]);
        }
        let (effective_from, effective_to) = match dep_type {
            DependencyType::Blocks => (from_id, to_id),
            DependencyType::IsBlockedBy => (to_id, from_id),
            DependencyType::RelatesTo => unreachable!(),
        };
        let mut parent: HashMap<i64, i64> = HashMap::new();
        let mut visited: HashSet<i64> = HashSet::new();
        visited.insert(effective_to);
        let mut stack = vec![effective_to];
        let mut found = effective_to == effective_from;
        while let Some(node) = stack.pop() {
            if node == effective_from {
                found = true;
                break;
            }
            for dep in self.store.dependencies_by_from_item(node).await? {
                if dep.dep_type == DependencyType::Blocks && visited.insert(dep.to_item_id) {
                    parent.insert(dep.to_item_id, node);
                    stack.push(dep.to_item_id);
                }
            }
            // row (node, to=peer, IS_BLOCKED_BY) means "peer BLOCKS node",
            // not a forward hop from node. A row (from=peer, to=node,
            // IS_BLOCKED_BY) means "node BLOCKS peer": a forward hop.
            for dep in self.store.dependencies_by_to_item(node).await? {
                if dep.dep_type == DependencyType::IsBlockedBy && visited.insert(dep.from_item_id) {
                    parent.insert(dep.from_item_id, node);
                    stack.push(dep.from_item_id);
                }
            }
        }
        if !found {
            return Ok(vec![effective_from, effective_to, effective_from]);
        }
        let mut path = vec![effective_from];
        let mut current = effective_from;
        while current != effective_to {
            match parent.get(&current) {
                Some(&p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }
        path.push(effective_from);
        Ok(path)
    }

    pub async fn query_dependencies(&self, params: QueryDependenciesParams) -> Value {
        match self.query_dependencies_inner(&params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn query_dependencies_inner(&self, params: &QueryDependenciesParams) -> CoreResult<Value> {
        let direction_str = params.direction.as_deref().unwrap_or("outgoing");
        if params.neighbors_only {
            let deps = match direction_str {
                "outgoing" => self.store.dependencies_by_from_item(params.item_id).await?,
                "incoming" => self.store.dependencies_by_to_item(params.item_id).await?,
                other => return Err(WorkItemError::Validation(format!("unknown direction '{other}'"))),
            };
            return Ok(json!({ "dependencies": deps }));
        }
        let direction = match direction_str {
            "outgoing" => Direction::Outgoing,
            "incoming" => Direction::Incoming,
            other => return Err(WorkItemError::Validation(format!("unknown direction '{other}'"))),
        };
        let graph = GraphService::new(self.store.as_ref());
        let chain = graph.dependency_chain(&[params.item_id], direction, params.max_depth).await?;
        let entries: Vec<Value> =
            chain.into_iter().map(|c| json!({ "item": c.item, "distance": c.distance })).collect();
        Ok(json!({ "chain": entries }))
    }

    // -------------------------------------------------------------
    // advance_item / get_next_status
    // -------------------------------------------------------------

    pub async fn advance_item(&self, params: AdvanceItemParams) -> Value {
        if let Some(transitions) = params.transitions {
            let mut results = Vec::new();
            for (i, t) in transitions.into_iter().enumerate() {
                let result = self.advance_one(t.item_id, &t.trigger, t.actor.clone()).await;
                results.push(response::batch_entry(i, result));
            }
            return response::batch_success(results);
        }
        let Some(item_id) = params.item_id else {
            return response::failure_from(&WorkItemError::Validation("'itemId' is required".to_string()));
        };
        let Some(trigger) = params.trigger else {
            return response::failure_from(&WorkItemError::Validation("'trigger' is required".to_string()));
        };
        match self.advance_one(item_id, &trigger, params.actor).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn advance_one(&self, item_id: i64, trigger_str: &str, actor: Option<String>) -> CoreResult<Value> {
        let trigger = validate::parse_trigger(trigger_str)?;
        let item = self.store.get_item(item_id).await?.ok_or_else(|| WorkItemError::item_not_found(item_id))?;
        let (workflow, schemas) = self.configs();
        let cascade = CascadeEngine::new(self.store.as_ref(), &workflow, &schemas);
        let (applied, updated, events) = cascade.apply_with_cascade(&item, trigger, actor).await?;
        let mut unblocked = Vec::new();
        if updated.role == Role::Terminal {
            let graph = GraphService::new(self.store.as_ref());
            unblocked = graph.newly_unblocked(item_id).await?;
        }
        Ok(json!({
            "item": updated,
            "transition": json!({
                "itemId": applied.item_id,
                "previousStatus": applied.previous_status,
                "newStatus": applied.new_status,
                "previousRole": applied.previous_role,
                "newRole": applied.new_role,
                "activeFlow": applied.active_flow,
                "flowSequence": applied.flow_sequence,
                "flowPosition": applied.flow_position,
            }),
            "cascadeEvents": events.iter().map(|e| json!({
                "item": e.item_id,
                "event": e.event,
                "applied": e.applied,
                "reason": e.reason,
            })).collect::<Vec<_>>(),
            "unblockedItems": unblocked.into_iter().map(|i| json!({ "id": i.id, "title": i.title })).collect::<Vec<_>>(),
        }))
    }

    pub async fn get_next_status(&self, params: GetNextStatusParams) -> Value {
        match self.get_next_status_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn get_next_status_inner(&self, params: GetNextStatusParams) -> CoreResult<Value> {
        let mut item = self
            .store
            .get_item(params.item_id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(params.item_id))?;
        if let Some(status) = params.hypothetical_status {
            item.status = status;
        }
        if let Some(tags) = params.hypothetical_tags {
            item.tags = tags;
        }
        let (workflow, schemas) = self.configs();
        let engine = WorkflowEngine::new(self.store.as_ref(), &workflow, &schemas);
        let recommendation = engine.next_status(&item).await?;
        Ok(recommendation_json(&recommendation))
    }

    // -------------------------------------------------------------
    // get_context / get_next_item / get_blocked_items
    // -------------------------------------------------------------

    pub async fn get_context(&self, params: GetContextParams) -> Value {
        match self.get_context_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn get_context_inner(&self, params: GetContextParams) -> CoreResult<Value> {
        match params.mode.as_str() {
            "item" => self.context_item(&params).await,
            "session" => self.context_session(&params).await,
            "health" => self.context_health().await,
            other => Err(unknown_operation(other)),
        }
    }

    async fn context_item(&self, params: &GetContextParams) -> CoreResult<Value> {
        let id = params
            .item_id
            .ok_or_else(|| WorkItemError::Validation("'itemId' is required for item mode".to_string()))?;
        let item = self.store.get_item(id).await?.ok_or_else(|| WorkItemError::item_not_found(id))?;
        let (_, schemas) = self.configs();
        let notes = self.store.notes_by_item(id).await?;
        let schema_service = NoteSchemaService::new(self.store.as_ref(), &schemas);
        let expected = schema_service.expected_notes(&item).await?;
        let graph = GraphService::new(self.store.as_ref());
        let blockers = graph.blockers(id).await?;
        let mut data = json!({
            "item": item,
            "notes": notes,
            "expectedNotes": expected,
            "blockers": blockers,
        });
        if params.include_ancestors {
            let ancestors = graph.ancestors(id).await?;
            data["ancestors"] = ancestors_json(&ancestors);
        }
        Ok(data)
    }

    async fn context_session(&self, params: &GetContextParams) -> CoreResult<Value> {
        let since = params
            .since
            .as_deref()
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .map_err(|e| WorkItemError::Validation(format!("invalid 'since' timestamp: {e}")))
            })
            .transpose()?;
        let items = self.store.all_items().await?;
        let recent: Vec<&WorkItem> = items
            .iter()
            .filter(|i| since.map(|s| i.role_changed_at >= s).unwrap_or(true))
            .collect();
        Ok(json!({ "items": recent }))
    }

    async fn context_health(&self) -> CoreResult<Value> {
        self.store.health_check().await?;
        let stats = self.store.stats().await?;
        Ok(json!({ "healthy": true, "stats": stats_to_json(&stats) }))
    }

    pub async fn get_next_item(&self, params: GetNextItemParams) -> Value {
        match self.get_next_item_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn get_next_item_inner(&self, params: GetNextItemParams) -> CoreResult<Value> {
        let filter = ItemFilter {
            role: Some(Role::Queue),
            tag: params.tag,
            limit: Some(params.limit.unwrap_or(1)),
            ..Default::default()
        };
        let items = self.store.query_items(filter).await?;
        Ok(json!({ "items": items }))
    }

    pub async fn get_blocked_items(&self, params: GetBlockedItemsParams) -> Value {
        match self.get_blocked_items_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn get_blocked_items_inner(&self, params: GetBlockedItemsParams) -> CoreResult<Value> {
        let filter = ItemFilter { role: Some(Role::Blocked), limit: params.limit, ..Default::default() };
        let on_hold = self.store.query_items(filter).await?;
        let graph = GraphService::new(self.store.as_ref());
        let mut waiting = Vec::new();
        for item in self.store.all_items().await? {
            if matches!(item.role, Role::Terminal | Role::Blocked) {
                continue;
            }
            let blockers = graph.blockers(item.id).await?;
            let unresolved: Vec<i64> =
                blockers.iter().filter(|b| b.role != Role::Terminal).map(|b| b.id).collect();
            if !unresolved.is_empty() {
                waiting.push(json!({ "item": item, "blockedBy": unresolved }));
            }
        }
        if let Some(limit) = params.limit {
            waiting.truncate(limit as usize);
        }
        Ok(json!({ "onHold": on_hold, "waitingOnDependencies": waiting }))
    }

    // -------------------------------------------------------------
    // create_work_tree / complete_tree
    // -------------------------------------------------------------

    pub async fn create_work_tree(&self, params: CreateWorkTreeParams) -> Value {
        match self.create_work_tree_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn create_work_tree_inner(&self, params: CreateWorkTreeParams) -> CoreResult<Value> {
        let mut key_to_id: HashMap<String, i64> = HashMap::new();
        let mut created_ids: Vec<i64> = Vec::new();
        let (workflow, _) = self.configs();
        let root_result = self
            .create_node(&params.root, None, &workflow, &mut key_to_id, &mut created_ids)
            .await;
        let root_id = match root_result {
            Ok(id) => id,
            Err(e) => {
                self.rollback(&created_ids).await;
                return Err(e);
            }
        };
        if let Err(e) = self.wire_dependencies(&params.dependencies, &key_to_id).await {
            self.rollback(&created_ids).await;
            return Err(e);
        }
        Ok(json!({ "rootId": root_id, "createdIds": created_ids }))
    }

    fn create_node<'f>(
        &'f self,
        node: &'f WorkTreeNode,
        parent_id: Option<i64>,
        workflow: &'f work_item_core::config::WorkflowConfig,
        key_to_id: &'f mut HashMap<String, i64>,
        created_ids: &'f mut Vec<i64>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<i64>> + Send + 'f>> {
        Box::pin(async move {
            let priority = match &node.priority {
                Some(p) => p.parse::<Priority>()?,
                None => Priority::default(),
            };
            let new_item = NewWorkItem {
                parent_id,
                title: node.title.clone(),
                description: node.description.clone(),
                tags: node.tags.clone(),
                priority,
                status: None,
            };
            validate::validate_new_item(&new_item)?;
            let item = self.store.create_item(new_item, workflow).await?;
            created_ids.push(item.id);
            if let Some(key) = &node.key {
                key_to_id.insert(key.clone(), item.id);
            }
            for note in &node.notes {
                let phase = validate::parse_role(&note.phase)?;
                let upsert =
                    UpsertNote { item_id: item.id, key: note.key.clone(), phase, body: note.body.clone() };
                validate::validate_upsert_note(&upsert)?;
                self.store.upsert_note(upsert).await?;
            }
            for child in &node.children {
                self.create_node(child, Some(item.id), workflow, key_to_id, created_ids).await?;
            }
            Ok(item.id)
        })
    }

    async fn wire_dependencies(
        &self,
        deps: &[WorkTreeDependency],
        key_to_id: &HashMap<String, i64>,
    ) -> CoreResult<()> {
        for dep in deps {
            let from = *key_to_id
                .get(&dep.from)
                .ok_or_else(|| WorkItemError::Validation(format!("unknown node key '{}'", dep.from)))?;
            let to = *key_to_id
                .get(&dep.to)
                .ok_or_else(|| WorkItemError::Validation(format!("unknown node key '{}'", dep.to)))?;
            let dep_type = validate::parse_dependency_type(&dep.dep_type)?;
            let new_dep = NewDependency { from_item_id: from, to_item_id: to, dep_type };
            validate::validate_new_dependency(&new_dep)?;
            let graph = GraphService::new(self.store.as_ref());
            if graph.would_introduce_dependency_cycle(from, to, dep_type).await? {
                return Err(WorkItemError::CycleDetected(format!(
                    "tree dependency {from} -> {to} would introduce a cycle"
                )));
            }
            self.store.create_dependency(new_dep).await?;
        }
        Ok(())
    }

    async fn rollback(&self, created_ids: &[i64]) {
        for &id in created_ids.iter().rev() {
            let _ = self.store.delete_item(id, true).await;
        }
    }

    pub async fn complete_tree(&self, params: CompleteTreeParams) -> Value {
        match self.complete_tree_inner(params).await {
            Ok(data) => response::success(data),
            Err(e) => response::failure_from(&e),
        }
    }

    async fn complete_tree_inner(&self, params: CompleteTreeParams) -> CoreResult<Value> {
        let trigger = validate::parse_trigger(&params.trigger)?;
        if !matches!(trigger, Trigger::Complete | Trigger::Cancel) {
            return Err(WorkItemError::Validation("trigger must be 'complete' or 'cancel'".to_string()));
        }
        let root = self
            .store
            .get_item(params.root_id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(params.root_id))?;
        let graph = GraphService::new(self.store.as_ref());
        let mut nodes = graph.descendants(params.root_id, None).await?;
        nodes.push(root);
        nodes.sort_by_key(|i| std::cmp::Reverse(i.depth));

        let (workflow, schemas) = self.configs();
        let cascade = CascadeEngine::new(self.store.as_ref(), &workflow, &schemas);
        let mut events = Vec::new();
        let mut touched = Vec::new();
        for node in nodes {
            let current = match self.store.get_item(node.id).await? {
                Some(i) => i,
                None => continue,
            };
            if current.role == Role::Terminal {
                continue;
            }
            // A node's own transition can fail (unresolved blockers, a missing
            // gate note) independently of its siblings. Record the failure
            // against this node and keep walking the rest of the subtree
            // rather than aborting the whole call.
            match cascade.apply_with_cascade(&current, trigger, None).await {
                Ok((_, updated, ev)) => {
                    touched.push(json!({ "id": updated.id, "status": updated.status, "ok": true }));
                    events.extend(ev.into_iter().map(|e| json!({
                        "item": e.item_id,
                        "event": e.event,
                        "applied": e.applied,
                        "reason": e.reason,
                    })));
                }
                Err(e) => {
                    touched.push(json!({
                        "id": current.id,
                        "ok": false,
                        "error": map_error(&e),
                    }));
                }
            }
        }
        Ok(json!({ "rootId": params.root_id, "items": touched, "cascadeEvents": events }))
    }
}

fn unknown_operation(operation: &str) -> WorkItemError {
    WorkItemError::Validation(format!("unknown operation '{operation}'"))
}

fn extract_id(payload: &Value) -> CoreResult<i64> {
    payload
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| WorkItemError::Validation("payload must include an integer 'id'".to_string()))
}

fn ancestors_json(ancestors: &[WorkItem]) -> Value {
    json!(ancestors
        .iter()
        .map(|a| json!({ "id": a.id, "title": a.title, "depth": a.depth }))
        .collect::<Vec<_>>())
}

fn recommendation_json(r: &Recommendation) -> Value {
    match r {
        Recommendation::Ready { target_status, reason } => {
            json!({ "outcome": "ready", "targetStatus": target_status, "reason": reason })
        }
        Recommendation::Blocked { missing_notes, unresolved_blockers, reason } => json!({
            "outcome": "blocked",
            "missingNotes": missing_notes,
            "unresolvedBlockers": unresolved_blockers,
            "reason": reason,
        }),
        Recommendation::Terminal { terminal_status, reason } => {
            json!({ "outcome": "terminal", "terminalStatus": terminal_status, "reason": reason })
        }
    }
}

fn stats_to_json(stats: &StoreStats) -> Value {
    let by_role: HashMap<String, u64> =
        stats.items_by_role.iter().map(|(role, count)| (role.to_string(), *count)).collect();
    json!({
        "totalItems": stats.total_items,
        "itemsByRole": by_role,
        "itemsByStatus": stats.items_by_status,
        "latestCreated": stats.latest_created,
        "latestRoleChange": stats.latest_role_change,
    })
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    #[serde(rename = "fromItemId")]
    from_item_id: i64,
    #[serde(rename = "toItemId")]
    to_item_id: i64,
    #[serde(rename = "type")]
    dep_type: String,
}

fn expand_dependency_request(params: &ManageDependenciesParams) -> CoreResult<Vec<NewDependency>> {
    if let Some(deps) = &params.dependencies {
        return deps
            .iter()
            .map(|v| {
                let raw: RawDependency = serde_json::from_value(v.clone())
                    .map_err(|e| WorkItemError::Validation(format!("invalid dependency payload: {e}")))?;
                Ok(NewDependency {
                    from_item_id: raw.from_item_id,
                    to_item_id: raw.to_item_id,
                    dep_type: validate::parse_dependency_type(&raw.dep_type)?,
                })
            })
            .collect();
    }
    let Some(pattern) = params.pattern.as_deref() else {
        return Ok(vec![]);
    };
    let ids = params
        .item_ids
        .clone()
        .ok_or_else(|| WorkItemError::Validation("'itemIds' is required with 'pattern'".to_string()))?;
    let dep_type_str = params
        .dep_type
        .clone()
        .ok_or_else(|| WorkItemError::Validation("'depType' is required with 'pattern'".to_string()))?;
    let dep_type = validate::parse_dependency_type(&dep_type_str)?;
    match pattern {
        "linear" => Ok(ids
            .windows(2)
            .map(|w| NewDependency { from_item_id: w[0], to_item_id: w[1], dep_type })
            .collect()),
        "fan-out" => {
            let (hub, spokes) = ids
                .split_first()
                .ok_or_else(|| WorkItemError::Validation("'itemIds' needs at least 2 entries".to_string()))?;
            Ok(spokes.iter().map(|&s| NewDependency { from_item_id: *hub, to_item_id: s, dep_type }).collect())
        }
        "fan-in" => {
            let (hub, spokes) = ids
                .split_first()
                .ok_or_else(|| WorkItemError::Validation("'itemIds' needs at least 2 entries".to_string()))?;
            Ok(spokes.iter().map(|&s| NewDependency { from_item_id: s, to_item_id: *hub, dep_type }).collect())
        }
        other => Err(WorkItemError::Validation(format!("unknown pattern '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocks::MockStore;

    fn dispatcher_over(store: MockStore) -> ToolDispatcher {
        let dir = std::env::temp_dir().join(format!("mcp-dispatcher-test-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        std::env::set_var("CONFIG_DIR", &dir);
        let config = Arc::new(ConfigCache::load().unwrap());
        std::env::remove_var("CONFIG_DIR");
        ToolDispatcher::new(Arc::new(store), config)
    }

    #[tokio::test]
    async fn create_then_get_item_round_trips() {
        let dispatcher = dispatcher_over(MockStore::new());
        let created = dispatcher
            .manage_items(ManageItemsParams {
                operation: "create".to_string(),
                item: Some(json!({ "parentId": null, "title": "Ship it", "description": null })),
                items: None,
            })
            .await;
        assert_eq!(created["ok"], true);
        let id = created["data"]["item"]["id"].as_i64().unwrap();

        let fetched = dispatcher
            .query_items(QueryItemsParams {
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
            .await;
        assert_eq!(fetched["data"]["item"]["title"], "Ship it");
    }

    #[tokio::test]
    async fn unknown_operation_surfaces_validation_error() {
        let dispatcher = dispatcher_over(MockStore::new());
        let result = dispatcher
            .manage_items(ManageItemsParams { operation: "explode".to_string(), item: None, items: None })
            .await;
        assert_eq!(result["ok"], false);
        assert_eq!(result["error"]["code"], "ValidationError");
    }

    #[tokio::test]
    async fn self_dependency_is_rejected_before_store_access() {
        let dispatcher = dispatcher_over(MockStore::new());
        let created = dispatcher
            .manage_items(ManageItemsParams {
                operation: "create".to_string(),
                item: Some(json!({ "parentId": null, "title": "A", "description": null })),
                items: None,
            })
            .await;
        let id = created["data"]["item"]["id"].as_i64().unwrap();

        let result = dispatcher
            .manage_dependencies(ManageDependenciesParams {
                operation: "create".to_string(),
                dependencies: Some(vec![json!({ "fromItemId": id, "toItemId": id, "type": "BLOCKS" })]),
                pattern: None,
                item_ids: None,
                dep_type: None,
                id: None,
            })
            .await;
        assert_eq!(result["ok"], false);
        assert_eq!(result["error"]["code"], "ValidationError");
    }
}
