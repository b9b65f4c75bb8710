//! Field-level validation for inbound tool payloads. Runs before any store
//! access so invalid input never reaches the database or the workflow
//! engine.

use crate::{
    error::{Result, WorkItemError},
    models::{DependencyType, NewDependency, NewWorkItem, UpsertNote},
};

const MAX_TITLE_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 20_000;
const MAX_TAG_LEN: usize = 50;
const MAX_NOTE_KEY_LEN: usize = 100;
const MAX_NOTE_BODY_LEN: usize = 50_000;

pub struct WorkItemValidator;

impl WorkItemValidator {
    /// A title must be non-empty once trimmed and within the length cap.
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(WorkItemError::empty_field("title"));
        }
        if trimmed.len() > MAX_TITLE_LEN {
            return Err(WorkItemError::Validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn validate_description(description: Option<&str>) -> Result<()> {
        let Some(description) = description else {
            return Ok(());
        };
        if description.trim().is_empty() {
            return Err(WorkItemError::Validation(
                "description must not be blank when provided".to_string(),
            ));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(WorkItemError::Validation(format!(
                "description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Tags must be non-empty, lowercase-normalizable strings without commas
    /// (the persisted form is itself comma-joined) and within the length cap.
    pub fn validate_tags(tags: &[String]) -> Result<()> {
        for tag in tags {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                return Err(WorkItemError::Validation("tags must not be blank".to_string()));
            }
            if trimmed.len() > MAX_TAG_LEN {
                return Err(WorkItemError::Validation(format!(
                    "tag '{trimmed}' exceeds the {MAX_TAG_LEN} character limit"
                )));
            }
            if trimmed.contains(',') {
                return Err(WorkItemError::Validation(format!(
                    "tag '{trimmed}' must not contain a comma"
                )));
            }
        }
        Ok(())
    }

    pub fn validate_new_item(item: &NewWorkItem) -> Result<()> {
        Self::validate_title(&item.title)?;
        Self::validate_description(item.description.as_deref())?;
        Self::validate_tags(&item.tags)?;
        Ok(())
    }

    pub fn validate_note_key(key: &str) -> Result<()> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(WorkItemError::empty_field("key"));
        }
        if trimmed.len() > MAX_NOTE_KEY_LEN {
            return Err(WorkItemError::Validation(format!(
                "note key must be at most {MAX_NOTE_KEY_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn validate_note_body(body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Err(WorkItemError::empty_field("body"));
        }
        if body.len() > MAX_NOTE_BODY_LEN {
            return Err(WorkItemError::Validation(format!(
                "note body must be at most {MAX_NOTE_BODY_LEN} characters"
            )));
        }
        Ok(())
    }

    pub fn validate_upsert_note(note: &UpsertNote) -> Result<()> {
        Self::validate_note_key(&note.key)?;
        Self::validate_note_body(&note.body)?;
        Ok(())
    }

    /// Structural checks on a dependency edge that don't require a store
    /// lookup: self-reference and type sanity. Existence of `from_id`/
    /// `to_id` and cycle detection are the graph service's job.
    pub fn validate_new_dependency(dep: &NewDependency) -> Result<()> {
        if dep.from_item_id == dep.to_item_id {
            return Err(WorkItemError::self_dependency(dep.from_item_id));
        }
        match dep.dep_type {
            DependencyType::Blocks | DependencyType::IsBlockedBy | DependencyType::RelatesTo => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    #[test]
    fn title_rejects_blank_and_oversized() {
        assert!(WorkItemValidator::validate_title("Ship it").is_ok());
        assert!(WorkItemValidator::validate_title("   ").is_err());
        assert!(WorkItemValidator::validate_title(&"a".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn description_allows_absence_but_not_blank() {
        assert!(WorkItemValidator::validate_description(None).is_ok());
        assert!(WorkItemValidator::validate_description(Some("fine")).is_ok());
        assert!(WorkItemValidator::validate_description(Some("   ")).is_err());
    }

    #[test]
    fn tags_reject_commas_and_blanks() {
        assert!(WorkItemValidator::validate_tags(&["impl".to_string()]).is_ok());
        assert!(WorkItemValidator::validate_tags(&["a,b".to_string()]).is_err());
        assert!(WorkItemValidator::validate_tags(&["".to_string()]).is_err());
    }

    #[test]
    fn new_item_runs_all_field_checks() {
        let item = NewWorkItem {
            parent_id: None,
            title: "Design the schema".to_string(),
            description: Some("details".to_string()),
            tags: vec!["impl".to_string()],
            priority: Priority::Medium,
            status: None,
        };
        assert!(WorkItemValidator::validate_new_item(&item).is_ok());

        let bad = NewWorkItem {
            title: "".to_string(),
            ..item
        };
        assert!(WorkItemValidator::validate_new_item(&bad).is_err());
    }

    #[test]
    fn self_dependency_rejected() {
        let dep = NewDependency {
            from_item_id: 1,
            to_item_id: 1,
            dep_type: DependencyType::Blocks,
        };
        assert!(WorkItemValidator::validate_new_dependency(&dep).is_err());
    }
}
