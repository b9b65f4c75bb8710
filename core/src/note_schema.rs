//! Note-schema service: tag-matched schemas projected against an item's
//! actual notes, producing the `exists` flag used to enrich
//! `manage_items(create)` responses and `get_context(item)`.

use serde::Serialize;

use crate::{
    config::NoteSchemaConfig,
    error::Result,
    models::{Role, WorkItem},
    store::Store,
};

/// A schema entry augmented with whether the item already has that note.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExpectedNote {
    pub key: String,
    pub phase: Role,
    pub required: bool,
    pub description: String,
    pub exists: bool,
}

pub struct NoteSchemaService<'a> {
    store: &'a dyn Store,
    schemas: &'a NoteSchemaConfig,
}

impl<'a> NoteSchemaService<'a> {
    pub fn new(store: &'a dyn Store, schemas: &'a NoteSchemaConfig) -> Self {
        Self { store, schemas }
    }

    /// Merged schema entries for an item's tag set (first-wins on key
    /// collision, configuration order).
    pub fn schema_for_item(&self, item: &WorkItem) -> Vec<crate::config::NoteSchemaEntry> {
        self.schemas.schema_for_tags(&item.tags)
    }

    pub fn required_for_phase(&self, item: &WorkItem, phase: Role) -> Vec<crate::config::NoteSchemaEntry> {
        self.schemas.required_for_phase(&item.tags, phase)
    }

    /// The schema entries for `item`, each annotated with whether a note
    /// with that key already exists.
    pub async fn expected_notes(&self, item: &WorkItem) -> Result<Vec<ExpectedNote>> {
        let entries = self.schema_for_item(item);
        if entries.is_empty() {
            return Ok(vec![]);
        }
        let existing = self.store.notes_by_item(item.id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| ExpectedNote {
                exists: existing.iter().any(|n| n.key == entry.key),
                key: entry.key,
                phase: entry.phase,
                required: entry.required,
                description: entry.description,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::models::{NewWorkItem, Priority, UpsertNote};
    use crate::test_support::InMemoryTestStore;

    #[tokio::test]
    async fn expected_notes_marks_existing_keys() {
        let store = InMemoryTestStore::new();
        let workflow = WorkflowConfig::default_bundled();
        let item = store
            .create_item(
                NewWorkItem {
                    parent_id: None,
                    title: "t".into(),
                    description: None,
                    tags: vec!["impl".to_string()],
                    priority: Priority::Medium,
                    status: None,
                },
                &workflow,
            )
            .await
            .unwrap();
        store
            .upsert_note(UpsertNote {
                item_id: item.id,
                key: "design".to_string(),
                phase: Role::Queue,
                body: "wire".to_string(),
            })
            .await
            .unwrap();

        let yaml = r#"
schemas:
  - matchTags: [impl]
    entries:
      - key: design
        phase: queue
        required: true
      - key: review-notes
        phase: review
        required: true
"#;
        let schemas = NoteSchemaConfig::from_yaml(yaml).unwrap();
        let service = NoteSchemaService::new(&store, &schemas);
        let expected = service.expected_notes(&item).await.unwrap();

        let design = expected.iter().find(|e| e.key == "design").unwrap();
        assert!(design.exists);
        let review = expected.iter().find(|e| e.key == "review-notes").unwrap();
        assert!(!review.exists);
    }

    #[tokio::test]
    async fn expected_notes_empty_when_no_schema_matches() {
        let store = InMemoryTestStore::new();
        let workflow = WorkflowConfig::default_bundled();
        let item = store
            .create_item(
                NewWorkItem {
                    parent_id: None,
                    title: "t".into(),
                    description: None,
                    tags: vec![],
                    priority: Priority::Medium,
                    status: None,
                },
                &workflow,
            )
            .await
            .unwrap();
        let schemas = NoteSchemaConfig::default();
        let service = NoteSchemaService::new(&store, &schemas);
        assert!(service.expected_notes(&item).await.unwrap().is_empty());
    }
}
