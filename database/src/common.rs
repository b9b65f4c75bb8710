use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use work_item_core::{
    error::{Result, WorkItemError},
    models::{Dependency, DependencyType, Note, Priority, Role, RoleTransition, Trigger, WorkItem},
};

/// Tags are persisted as a comma-joined string; empty fields round-trip to
/// an empty `Vec`.
pub fn tags_to_string(tags: &[String]) -> String {
    tags.join(",")
}

pub fn string_to_tags(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').map(|t| t.to_string()).collect()
    }
}

pub fn row_to_item(row: &SqliteRow) -> Result<WorkItem> {
    let tags_str: String = row.get("tags");
    let priority_str: String = row.get("priority");
    let role_str: String = row.get("role");
    let previous_role_str: Option<String> = row.get("previous_role");

    Ok(WorkItem {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        depth: row.get("depth"),
        title: row.get("title"),
        description: row.get("description"),
        tags: string_to_tags(&tags_str),
        priority: Priority::from_str(&priority_str)?,
        status: row.get("status"),
        role: Role::from_str(&role_str)?,
        previous_role: previous_role_str.map(|s| Role::from_str(&s)).transpose()?,
        role_changed_at: row.get("role_changed_at"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

pub fn row_to_note(row: &SqliteRow) -> Result<Note> {
    let phase_str: String = row.get("phase");
    Ok(Note {
        id: row.get("id"),
        item_id: row.get("item_id"),
        key: row.get("key"),
        phase: Role::from_str(&phase_str)?,
        body: row.get("body"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

pub fn row_to_dependency(row: &SqliteRow) -> Result<Dependency> {
    let dep_type_str: String = row.get("type");
    Ok(Dependency {
        id: row.get("id"),
        from_item_id: row.get("from_id"),
        to_item_id: row.get("to_id"),
        dep_type: DependencyType::from_str(&dep_type_str)?,
        created_at: row.get("created_at"),
    })
}

pub fn row_to_transition(row: &SqliteRow) -> Result<RoleTransition> {
    let from_role_str: String = row.get("from_role");
    let to_role_str: String = row.get("to_role");
    let trigger_str: String = row.get("trigger");
    Ok(RoleTransition {
        id: row.get("id"),
        item_id: row.get("item_id"),
        from_role: Role::from_str(&from_role_str)?,
        to_role: Role::from_str(&to_role_str)?,
        from_status: row.get("from_status"),
        to_status: row.get("to_status"),
        trigger: Trigger::from_str(&trigger_str)?,
        applied_at: row.get("applied_at"),
        actor: row.get("actor"),
    })
}

/// Map a raw SQLx error onto the work-item error taxonomy. Unique-constraint
/// violations are classified by which table they came from: duplicate
/// `(item_id, key)` on `notes` and duplicate `(from_id, to_id, type)` on
/// `dependencies` both surface as `Conflict`.
pub fn sqlx_error_to_work_item_error(err: sqlx::Error) -> WorkItemError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                WorkItemError::Conflict(format!("unique constraint violated: {message}"))
            } else {
                WorkItemError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => WorkItemError::Database("unexpected missing row".to_string()),
        sqlx::Error::PoolTimedOut => WorkItemError::Database("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => WorkItemError::Database(format!("database I/O error: {io_err}")),
        _ => WorkItemError::Database(format!("database operation failed: {err}")),
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
