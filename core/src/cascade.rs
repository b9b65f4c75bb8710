//! The cascade engine: detects upward role transitions triggered by
//! child-state changes and applies them recursively up to a depth cap.

use serde::Serialize;

use crate::{
    config::{NoteSchemaConfig, WorkflowConfig},
    error::Result,
    models::{Role, Trigger, WorkItem},
    store::Store,
    workflow::{AppliedTransition, WorkflowEngine},
};

/// Which cascade rule fired. `all_features_complete` from the spec's event
/// table is not a distinct variant here — it is the natural recursive
/// reapplication of [`CascadeEventKind::AllTasksComplete`] one level up,
/// exactly as the design notes describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeEventKind {
    FirstTaskStarted,
    AllTasksComplete,
}

/// One recorded cascade attempt, successful or not.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CascadeEvent {
    pub item_id: i64,
    pub event: CascadeEventKind,
    pub applied: bool,
    pub reason: Option<String>,
}

pub struct CascadeEngine<'a> {
    store: &'a dyn Store,
    workflow: &'a WorkflowConfig,
    schemas: &'a NoteSchemaConfig,
    max_depth: u32,
}

impl<'a> CascadeEngine<'a> {
    pub fn new(
        store: &'a dyn Store,
        workflow: &'a WorkflowConfig,
        schemas: &'a NoteSchemaConfig,
    ) -> Self {
        Self {
            store,
            workflow,
            schemas,
            max_depth: workflow.auto_cascade.max_depth,
        }
    }

    fn engine(&self) -> WorkflowEngine<'a> {
        WorkflowEngine::new(self.store, self.workflow, self.schemas)
    }

    /// Apply `trigger` to `item`, then recursively cascade into ancestors.
    /// The triggering transition's own failure propagates to the caller
    /// (it never partially mutates state); cascade failures beyond that
    /// point are recorded as unapplied events, never top-level errors.
    pub async fn apply_with_cascade(
        &self,
        item: &WorkItem,
        trigger: Trigger,
        actor: Option<String>,
    ) -> Result<(AppliedTransition, WorkItem, Vec<CascadeEvent>)> {
        let (applied, updated) = self.engine().advance(item, trigger, actor).await?;
        let mut events = Vec::new();
        if self.workflow.auto_cascade.enabled {
            self.cascade_into_parent(&updated, 1, &mut events).await?;
        }
        Ok((applied, updated, events))
    }

    async fn detect_event(&self, x: &WorkItem, parent: &WorkItem) -> Result<Option<(Trigger, CascadeEventKind)>> {
        if x.role == Role::Work {
            let flow = self.workflow.select_flow(&parent.tags);
            if flow.position_of(&parent.status) == Some(0) {
                return Ok(Some((Trigger::Start, CascadeEventKind::FirstTaskStarted)));
            }
        }
        let siblings = self.store.items_by_parent(Some(parent.id)).await?;
        if !siblings.is_empty() && siblings.iter().all(|s| s.role == Role::Terminal) {
            return Ok(Some((Trigger::Complete, CascadeEventKind::AllTasksComplete)));
        }
        Ok(None)
    }

    fn cascade_into_parent<'f>(
        &'f self,
        x: &'f WorkItem,
        hop: u32,
        events: &'f mut Vec<CascadeEvent>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'f>> {
        Box::pin(async move {
            let Some(parent_id) = x.parent_id else {
                return Ok(());
            };
            let Some(parent) = self.store.get_item(parent_id).await? else {
                return Ok(());
            };
            let Some((trigger, kind)) = self.detect_event(x, &parent).await? else {
                return Ok(());
            };

            if hop > self.max_depth {
                events.push(CascadeEvent {
                    item_id: parent_id,
                    event: kind,
                    applied: false,
                    reason: Some("CascadeDepthExceeded".to_string()),
                });
                return Ok(());
            }

            match self.engine().advance(&parent, trigger, None).await {
                Ok((_, updated_parent)) => {
                    events.push(CascadeEvent {
                        item_id: parent_id,
                        event: kind,
                        applied: true,
                        reason: None,
                    });
                    self.cascade_into_parent(&updated_parent, hop + 1, events).await?;
                }
                Err(e) => {
                    events.push(CascadeEvent {
                        item_id: parent_id,
                        event: kind,
                        applied: false,
                        reason: Some(e.to_string()),
                    });
                }
            }
            Ok(())
        })
    }
}
