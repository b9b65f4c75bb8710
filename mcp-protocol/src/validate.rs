//! Per-tool-family request validation. Runs before any store access: a
//! malformed operation name, an out-of-range trigger string, or a field
//! [`WorkItemValidator`] rejects all surface as `ValidationError` here
//! rather than reaching the workflow engine or the store.

use work_item_core::error::{Result, WorkItemError};
use work_item_core::models::{DependencyType, NewDependency, NewWorkItem, Role, Trigger, UpsertNote};
use work_item_core::validation::WorkItemValidator;

pub fn validate_operation(operation: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&operation) {
        Ok(())
    } else {
        Err(WorkItemError::Validation(format!(
            "unknown operation '{operation}', expected one of {allowed:?}"
        )))
    }
}

pub fn validate_new_item(item: &NewWorkItem) -> Result<()> {
    WorkItemValidator::validate_new_item(item)
}

pub fn validate_upsert_note(note: &UpsertNote) -> Result<()> {
    WorkItemValidator::validate_upsert_note(note)
}

pub fn validate_new_dependency(dep: &NewDependency) -> Result<()> {
    WorkItemValidator::validate_new_dependency(dep)
}

pub fn parse_trigger(raw: &str) -> Result<Trigger> {
    raw.parse()
}

pub fn parse_dependency_type(raw: &str) -> Result<DependencyType> {
    raw.parse()
}

pub fn parse_role(raw: &str) -> Result<Role> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_operation_rejects_unknown_verbs() {
        assert!(validate_operation("create", &["create", "update", "delete"]).is_ok());
        assert!(validate_operation("destroy", &["create", "update", "delete"]).is_err());
    }

    #[test]
    fn parse_trigger_rejects_unknown_names() {
        assert!(parse_trigger("start").is_ok());
        assert!(parse_trigger("teleport").is_err());
    }
}
