//! The role-based workflow engine: trigger resolution, gate and
//! prerequisite checks, and the `advance` entry point.

use crate::{
    config::{FlowDef, NoteSchemaConfig, WorkflowConfig},
    error::{Result, WorkItemError},
    graph::GraphService,
    models::{Role, Trigger, WorkItem},
    store::{PendingTransition, Store},
};

const CANCELLED_STATUS: &str = "cancelled";
const ON_HOLD_STATUS: &str = "on_hold";
const BLOCKED_STATUS: &str = "blocked";

/// Result of a pure, non-mutating `nextStatus` query.
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    Ready {
        target_status: String,
        reason: String,
    },
    Blocked {
        missing_notes: Vec<String>,
        unresolved_blockers: Vec<i64>,
        reason: String,
    },
    Terminal {
        terminal_status: String,
        reason: String,
    },
}

/// The result of one applied transition, returned by [`WorkflowEngine::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransition {
    pub item_id: i64,
    pub previous_status: String,
    pub new_status: String,
    pub previous_role: Role,
    pub new_role: Role,
    pub active_flow: String,
    pub flow_sequence: Vec<String>,
    pub flow_position: Option<usize>,
}

/// Stateless workflow engine. Receives the current config snapshot by
/// reference on every call — never held as module-level global state, per
/// the configuration-mutability design note.
pub struct WorkflowEngine<'a> {
    store: &'a dyn Store,
    workflow: &'a WorkflowConfig,
    schemas: &'a NoteSchemaConfig,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(store: &'a dyn Store, workflow: &'a WorkflowConfig, schemas: &'a NoteSchemaConfig) -> Self {
        Self {
            store,
            workflow,
            schemas,
        }
    }

    fn active_flow(&self, item: &WorkItem) -> &'a FlowDef {
        self.workflow.select_flow(&item.tags)
    }

    /// Resolve a symbolic trigger against an item's active flow and current
    /// status, returning the target status string.
    pub fn resolve_trigger(&self, item: &WorkItem, trigger: Trigger) -> Result<String> {
        let flow = self.active_flow(item);
        match trigger {
            Trigger::Start => flow
                .first_non_queue(&self.workflow.status_roles)
                .map(str::to_string)
                .ok_or_else(|| {
                    WorkItemError::NoTransitionAvailable(format!(
                        "flow '{}' has no work-role status to start into",
                        flow.name
                    ))
                }),
            Trigger::Complete => flow.first_terminal().map(str::to_string).ok_or_else(|| {
                WorkItemError::NoTransitionAvailable(format!(
                    "flow '{}' has no terminal status",
                    flow.name
                ))
            }),
            Trigger::Cancel => {
                if flow.is_terminal(CANCELLED_STATUS) || self.workflow.status_roles.contains_key(CANCELLED_STATUS) {
                    Ok(CANCELLED_STATUS.to_string())
                } else {
                    Err(WorkItemError::NoTransitionAvailable(
                        "no cancelled status configured".to_string(),
                    ))
                }
            }
            Trigger::Block => self.pick_emergency(flow, BLOCKED_STATUS),
            Trigger::Hold => self.pick_emergency(flow, ON_HOLD_STATUS),
            Trigger::Resume => self.resolve_resume(item),
            Trigger::Back => self.resolve_back(item, flow),
        }
    }

    fn pick_emergency(&self, flow: &FlowDef, preferred: &str) -> Result<String> {
        if flow.emergency.iter().any(|s| s == preferred) {
            return Ok(preferred.to_string());
        }
        flow.emergency
            .iter()
            .find(|s| {
                self.workflow
                    .status_roles
                    .get(*s)
                    .map(|r| *r == Role::Blocked)
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| {
                WorkItemError::NoTransitionAvailable(format!(
                    "flow '{}' has no blocked-role emergency status",
                    flow.name
                ))
            })
    }

    /// `resume` restores the most recent non-blocked status recorded in the
    /// role-transition log, scanning backward; fails if the item has never
    /// left a blocked role.
    async fn resolve_resume_async(&self, item: &WorkItem) -> Result<String> {
        let mut history = self.store.transitions_by_item(item.id).await?;
        history.sort_by_key(|t| t.id);
        for transition in history.into_iter().rev() {
            if transition.to_role != Role::Blocked && transition.from_role != transition.to_role {
                return Ok(transition.to_status);
            }
        }
        Err(WorkItemError::NoTransitionAvailable(
            "no prior non-blocked status to resume to".to_string(),
        ))
    }

    fn resolve_resume(&self, _item: &WorkItem) -> Result<String> {
        // Placeholder branch kept out of the sync `resolve_trigger` match;
        // `advance` calls `resolve_resume_async` directly instead.
        Err(WorkItemError::Internal(
            "resolve_resume must be called via resolve_resume_async".to_string(),
        ))
    }

    fn resolve_back(&self, item: &WorkItem, flow: &FlowDef) -> Result<String> {
        let position = flow.position_of(&item.status).ok_or_else(|| {
            WorkItemError::NoTransitionAvailable(format!(
                "status '{}' is not part of flow '{}'",
                item.status, flow.name
            ))
        })?;
        if position == 0 {
            return Err(WorkItemError::NoTransitionAvailable(
                "already at the first status of the flow".to_string(),
            ));
        }
        Ok(flow.sequence[position - 1].clone())
    }

    /// Pure, non-mutating recommendation for an item's next status under
    /// the `complete`-equivalent trigger path used by `get_next_status`.
    pub async fn next_status(&self, item: &WorkItem) -> Result<Recommendation> {
        let flow = self.active_flow(item);
        let current_role = match self.workflow.role_for_status(&item.status) {
            Ok(role) => role,
            Err(_) => {
                return Ok(Recommendation::Blocked {
                    missing_notes: vec![],
                    unresolved_blockers: vec![],
                    reason: format!("status '{}' has no role mapping", item.status),
                })
            }
        };
        if current_role == Role::Terminal {
            return Ok(Recommendation::Terminal {
                terminal_status: item.status.clone(),
                reason: "item is already terminal".to_string(),
            });
        }
        let trigger = match current_role {
            Role::Queue => Trigger::Start,
            Role::Blocked => Trigger::Resume,
            _ => Trigger::Complete,
        };
        let target_status = if trigger == Trigger::Resume {
            match self.resolve_resume_async(item).await {
                Ok(s) => s,
                Err(e) => {
                    return Ok(Recommendation::Blocked {
                        missing_notes: vec![],
                        unresolved_blockers: vec![],
                        reason: e.to_string(),
                    })
                }
            }
        } else {
            match self.resolve_trigger(item, trigger) {
                Ok(s) => s,
                Err(e) => {
                    return Ok(Recommendation::Blocked {
                        missing_notes: vec![],
                        unresolved_blockers: vec![],
                        reason: e.to_string(),
                    })
                }
            }
        };
        let target_role = self.workflow.role_for_status(&target_status)?;
        let missing = self.gate_check(item, current_role).await?;
        if !missing.is_empty() {
            return Ok(Recommendation::Blocked {
                missing_notes: missing,
                unresolved_blockers: vec![],
                reason: "required notes missing for current phase".to_string(),
            });
        }
        if target_role == Role::Terminal {
            let blockers = self.unresolved_blockers(item.id).await?;
            if !blockers.is_empty() {
                return Ok(Recommendation::Blocked {
                    missing_notes: vec![],
                    unresolved_blockers: blockers,
                    reason: "unresolved blocking dependencies".to_string(),
                });
            }
        }
        if target_role == Role::Terminal {
            return Ok(Recommendation::Terminal {
                terminal_status: target_status,
                reason: "ready to complete".to_string(),
            });
        }
        Ok(Recommendation::Ready {
            target_status,
            reason: format!("flow '{}' resolves {:?} to this status", flow.name, trigger),
        })
    }

    async fn gate_check(&self, item: &WorkItem, source_role: Role) -> Result<Vec<String>> {
        let required = self.schemas.required_for_phase(&item.tags, source_role);
        if required.is_empty() {
            return Ok(vec![]);
        }
        let existing = self.store.notes_by_item(item.id).await?;
        let missing: Vec<String> = required
            .into_iter()
            .filter(|entry| !existing.iter().any(|n| n.key == entry.key))
            .map(|entry| entry.key)
            .collect();
        Ok(missing)
    }

    async fn unresolved_blockers(&self, item_id: i64) -> Result<Vec<i64>> {
        let graph = GraphService::new(self.store);
        let blockers = graph.blockers(item_id).await?;
        Ok(blockers
            .into_iter()
            .filter(|b| b.role != Role::Terminal)
            .map(|b| b.id)
            .collect())
    }

    /// Resolve `trigger`, run gate and prerequisite checks, and apply the
    /// transition. Does not cascade — callers that need cascade propagation
    /// use the `cascade` module's wrapper around this method.
    pub async fn advance(
        &self,
        item: &WorkItem,
        trigger: Trigger,
        actor: Option<String>,
    ) -> Result<(AppliedTransition, WorkItem)> {
        let flow = self.active_flow(item);
        let flow_name = flow.name.clone();
        let flow_sequence = flow.sequence.clone();

        let current_role = self.workflow.role_for_status(&item.status)?;

        let target_status = if trigger == Trigger::Resume {
            self.resolve_resume_async(item).await?
        } else {
            self.resolve_trigger(item, trigger)?
        };
        let target_role = self.workflow.role_for_status(&target_status)?;

        let crosses_role = current_role != target_role;

        if trigger != Trigger::Cancel && crosses_role {
            let missing = self.gate_check(item, current_role).await?;
            if !missing.is_empty() {
                return Err(WorkItemError::GateBlocked { missing });
            }
            if target_role == Role::Terminal {
                let blockers = self.unresolved_blockers(item.id).await?;
                if !blockers.is_empty() {
                    return Err(WorkItemError::DependenciesNotResolved { blockers });
                }
            }
        }

        let pending = PendingTransition {
            item_id: item.id,
            expected_status: item.status.clone(),
            new_status: target_status.clone(),
            new_role: target_role,
            trigger,
            actor,
        };
        let mut updated = self.store.apply_transitions(vec![pending]).await?;
        let updated_item = updated.pop().ok_or_else(|| {
            WorkItemError::Internal("apply_transitions returned no rows".to_string())
        })?;

        let flow_position = flow.position_of(&target_status);
        let applied = AppliedTransition {
            item_id: item.id,
            previous_status: item.status.clone(),
            new_status: target_status,
            previous_role: current_role,
            new_role: target_role,
            active_flow: flow_name,
            flow_sequence,
            flow_position,
        };
        Ok((applied, updated_item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AutoCascadeConfig, FlowDef};
    use crate::models::{NewWorkItem, Priority, UpsertNote};
    use crate::test_support::InMemoryTestStore;
    use std::collections::HashMap;

    fn impl_workflow() -> WorkflowConfig {
        let mut status_roles = HashMap::new();
        status_roles.insert("pending".to_string(), Role::Queue);
        status_roles.insert("coding".to_string(), Role::Work);
        status_roles.insert("review".to_string(), Role::Review);
        status_roles.insert("blocked".to_string(), Role::Blocked);
        status_roles.insert("on_hold".to_string(), Role::Blocked);
        status_roles.insert("done".to_string(), Role::Terminal);
        status_roles.insert("cancelled".to_string(), Role::Terminal);

        WorkflowConfig {
            flows: vec![
                FlowDef {
                    name: "default".to_string(),
                    match_tags: vec![],
                    sequence: vec!["pending".to_string(), "coding".to_string(), "done".to_string()],
                    terminal: vec!["done".to_string(), "cancelled".to_string()],
                    emergency: vec!["blocked".to_string(), "on_hold".to_string()],
                },
                FlowDef {
                    name: "impl".to_string(),
                    match_tags: vec!["impl".to_string()],
                    sequence: vec![
                        "pending".to_string(),
                        "coding".to_string(),
                        "review".to_string(),
                        "done".to_string(),
                    ],
                    terminal: vec!["done".to_string(), "cancelled".to_string()],
                    emergency: vec!["blocked".to_string(), "on_hold".to_string()],
                },
            ],
            status_roles,
            auto_cascade: AutoCascadeConfig::default(),
        }
    }

    async fn seed(store: &InMemoryTestStore, workflow: &WorkflowConfig, tags: Vec<String>) -> WorkItem {
        store
            .create_item(
                NewWorkItem {
                    parent_id: None,
                    title: "t".into(),
                    description: None,
                    tags,
                    priority: Priority::Medium,
                    status: None,
                },
                workflow,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_trigger_moves_queue_to_first_work_status() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let item = seed(&store, &workflow, vec![]).await;

        let engine = WorkflowEngine::new(&store, &workflow, &schemas);
        let (applied, updated) = engine.advance(&item, Trigger::Start, None).await.unwrap();
        assert_eq!(applied.new_status, "coding");
        assert_eq!(updated.role, Role::Work);
    }

    #[tokio::test]
    async fn gate_blocks_start_until_required_note_exists() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas_yaml = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
"#;
        let schemas = NoteSchemaConfig::from_yaml(schemas_yaml).unwrap();
        let item = seed(&store, &workflow, vec!["impl".to_string()]).await;

        let engine = WorkflowEngine::new(&store, &workflow, &schemas);
        let err = engine.advance(&item, Trigger::Start, None).await.unwrap_err();
        assert!(matches!(err, WorkItemError::GateBlocked { .. }));

        store
            .upsert_note(UpsertNote {
                item_id: item.id,
                key: "design".to_string(),
                phase: Role::Queue,
                body: "wire".to_string(),
            })
            .await
            .unwrap();

        let (applied, _) = engine.advance(&item, Trigger::Start, None).await.unwrap();
        assert_eq!(applied.new_role, Role::Work);
    }

    #[tokio::test]
    async fn complete_on_impl_flow_stops_at_review_then_terminal() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let item = seed(&store, &workflow, vec!["impl".to_string()]).await;
        let engine = WorkflowEngine::new(&store, &workflow, &schemas);

        let (_, item) = engine.advance(&item, Trigger::Start, None).await.unwrap();
        let (applied, item) = engine.advance(&item, Trigger::Complete, None).await.unwrap();
        assert_eq!(applied.new_status, "review");
        assert_eq!(item.role, Role::Review);

        let (applied, item) = engine.advance(&item, Trigger::Complete, None).await.unwrap();
        assert_eq!(applied.new_status, "done");
        assert_eq!(item.role, Role::Terminal);
    }

    #[tokio::test]
    async fn cancel_bypasses_gate_even_when_notes_missing() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas_yaml = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
"#;
        let schemas = NoteSchemaConfig::from_yaml(schemas_yaml).unwrap();
        let item = seed(&store, &workflow, vec!["impl".to_string()]).await;
        let engine = WorkflowEngine::new(&store, &workflow, &schemas);

        let (applied, item) = engine.advance(&item, Trigger::Cancel, None).await.unwrap();
        assert_eq!(applied.new_status, "cancelled");
        assert_eq!(item.role, Role::Terminal);
    }

    #[tokio::test]
    async fn second_cancel_is_not_a_transition() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let item = seed(&store, &workflow, vec![]).await;
        let engine = WorkflowEngine::new(&store, &workflow, &schemas);

        let (_, item) = engine.advance(&item, Trigger::Cancel, None).await.unwrap();
        let err = engine.advance(&item, Trigger::Cancel, None).await.unwrap_err();
        assert!(matches!(err, WorkItemError::NoTransitionAvailable(_)));
    }

    #[tokio::test]
    async fn completing_terminal_blocked_by_unresolved_dependency() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let blocker = seed(&store, &workflow, vec![]).await;
        let item = seed(&store, &workflow, vec![]).await;
        store
            .create_dependency(crate::models::NewDependency {
                from_item_id: blocker.id,
                to_item_id: item.id,
                dep_type: crate::models::DependencyType::Blocks,
            })
            .await
            .unwrap();

        let engine = WorkflowEngine::new(&store, &workflow, &schemas);
        let (_, item) = engine.advance(&item, Trigger::Start, None).await.unwrap();
        let err = engine
            .advance(&item, Trigger::Complete, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkItemError::DependenciesNotResolved { .. }));
    }

    #[tokio::test]
    async fn resume_restores_most_recent_non_blocked_status() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let item = seed(&store, &workflow, vec![]).await;
        let engine = WorkflowEngine::new(&store, &workflow, &schemas);

        let (_, item) = engine.advance(&item, Trigger::Start, None).await.unwrap();
        let (_, item) = engine.advance(&item, Trigger::Block, None).await.unwrap();
        assert_eq!(item.status, "blocked");

        let (applied, item) = engine.advance(&item, Trigger::Resume, None).await.unwrap();
        assert_eq!(applied.new_status, "coding");
        assert_eq!(item.role, Role::Work);
    }

    #[tokio::test]
    async fn resume_with_no_prior_status_fails() {
        let store = InMemoryTestStore::new();
        let workflow = impl_workflow();
        let schemas = NoteSchemaConfig::default();
        let item = seed(&store, &workflow, vec![]).await;
        let engine = WorkflowEngine::new(&store, &workflow, &schemas);

        let err = engine.advance(&item, Trigger::Resume, None).await.unwrap_err();
        assert!(matches!(err, WorkItemError::NoTransitionAvailable(_)));
    }
}
