use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five semantic phases every configured status maps to.
///
/// Roles are closed by design — unlike `status`, which is a
/// configuration-defined string, `Role` is the fixed vocabulary the
/// workflow engine, the note-schema gate and the cascade engine key off.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Queue,
    Work,
    Review,
    Blocked,
    Terminal,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Queue => write!(f, "queue"),
            Role::Work => write!(f, "work"),
            Role::Review => write!(f, "review"),
            Role::Blocked => write!(f, "blocked"),
            Role::Terminal => write!(f, "terminal"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Role::Queue),
            "work" => Ok(Role::Work),
            "review" => Ok(Role::Review),
            "blocked" => Ok(Role::Blocked),
            "terminal" => Ok(Role::Terminal),
            other => Err(crate::error::WorkItemError::Internal(format!(
                "unknown role in storage: {other}"
            ))),
        }
    }
}

/// Work item priority. Closed vocabulary per spec (low/medium/high).
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(crate::error::WorkItemError::Validation(format!(
                "invalid priority: {other}"
            ))),
        }
    }
}

/// Typed dependency edge kind. `RelatesTo` is undirected in semantics but
/// stored as a single directed record.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    Blocks,
    IsBlockedBy,
    RelatesTo,
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyType::Blocks => write!(f, "BLOCKS"),
            DependencyType::IsBlockedBy => write!(f, "IS_BLOCKED_BY"),
            DependencyType::RelatesTo => write!(f, "RELATES_TO"),
        }
    }
}

impl std::str::FromStr for DependencyType {
    type Err = crate::error::WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLOCKS" => Ok(DependencyType::Blocks),
            "IS_BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
            "RELATES_TO" => Ok(DependencyType::RelatesTo),
            other => Err(crate::error::WorkItemError::Validation(format!(
                "invalid dependency type: {other}"
            ))),
        }
    }
}

/// Symbolic transition verbs, resolved at runtime against the active flow.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    Complete,
    Cancel,
    Block,
    Hold,
    Resume,
    Back,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Start => "start",
            Trigger::Complete => "complete",
            Trigger::Cancel => "cancel",
            Trigger::Block => "block",
            Trigger::Hold => "hold",
            Trigger::Resume => "resume",
            Trigger::Back => "back",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Trigger {
    type Err = crate::error::WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Trigger::Start),
            "complete" => Ok(Trigger::Complete),
            "cancel" => Ok(Trigger::Cancel),
            "block" => Ok(Trigger::Block),
            "hold" => Ok(Trigger::Hold),
            "resume" => Ok(Trigger::Resume),
            "back" => Ok(Trigger::Back),
            other => Err(crate::error::WorkItemError::Validation(format!(
                "unknown trigger: {other}"
            ))),
        }
    }
}

/// A node in the hierarchy/dependency graph.
///
/// `tags` is kept as a parsed `Vec<String>` at this layer; the
/// comma-separated storage representation is a store-boundary concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub depth: i32,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub status: String,
    pub role: Role,
    pub previous_role: Option<Role>,
    pub role_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl WorkItem {
    pub const MAX_DEPTH: i32 = 3;

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn tag_set(&self) -> std::collections::BTreeSet<String> {
        self.tags.iter().cloned().collect()
    }
}

/// DTO for `manage_items(create)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkItem {
    pub parent_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Explicit initial status. When absent, the store assigns the first
    /// queue-role status of the item's active flow.
    pub status: Option<String>,
}

/// DTO for `manage_items(update)`. `Option<Option<T>>` fields distinguish
/// "leave unchanged" from "set to null".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateWorkItem {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
    pub parent_id: Option<Option<i64>>,
}

/// A structured note attached to a work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: i64,
    pub item_id: i64,
    pub key: String,
    pub phase: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// DTO for `manage_notes(upsert)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertNote {
    pub item_id: i64,
    pub key: String,
    pub phase: Role,
    pub body: String,
}

/// A typed dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dependency {
    pub id: i64,
    pub from_item_id: i64,
    pub to_item_id: i64,
    pub dep_type: DependencyType,
    pub created_at: DateTime<Utc>,
}

/// DTO for the `manage_dependencies` explicit-array form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDependency {
    pub from_item_id: i64,
    pub to_item_id: i64,
    pub dep_type: DependencyType,
}

/// Append-only audit row. Only role-boundary crossings are recorded;
/// status-within-role changes are not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleTransition {
    pub id: i64,
    pub item_id: i64,
    pub from_role: Role,
    pub to_role: Role,
    pub from_status: String,
    pub to_status: String,
    pub trigger: Trigger,
    pub applied_at: DateTime<Utc>,
    pub actor: Option<String>,
}

/// DTO for recording a transition row.
#[derive(Debug, Clone)]
pub struct NewRoleTransition {
    pub item_id: i64,
    pub from_role: Role,
    pub to_role: Role,
    pub from_status: String,
    pub to_status: String,
    pub trigger: Trigger,
    pub actor: Option<String>,
}

/// Filter criteria for `query_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub parent_id: Option<Option<i64>>,
    pub role: Option<Role>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_display_and_from_str() {
        for role in [
            Role::Queue,
            Role::Work,
            Role::Review,
            Role::Blocked,
            Role::Terminal,
        ] {
            let s = role.to_string();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn dependency_type_round_trips() {
        for dep in [
            DependencyType::Blocks,
            DependencyType::IsBlockedBy,
            DependencyType::RelatesTo,
        ] {
            let s = dep.to_string();
            let parsed: DependencyType = s.parse().unwrap();
            assert_eq!(parsed, dep);
        }
    }

    #[test]
    fn work_item_has_tag_is_order_insignificant() {
        let item = WorkItem {
            id: 1,
            parent_id: None,
            depth: 0,
            title: "t".into(),
            description: None,
            tags: vec!["backend".into(), "impl".into()],
            priority: Priority::Medium,
            status: "pending".into(),
            role: Role::Queue,
            previous_role: None,
            role_changed_at: Utc::now(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };
        assert!(item.has_tag("impl"));
        assert!(item.has_tag("backend"));
        assert!(!item.has_tag("frontend"));
    }
}
