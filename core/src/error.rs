use thiserror::Error;

/// Result type alias for work-item operations.
pub type Result<T> = std::result::Result<T, WorkItemError>;

/// Error taxonomy for the work-item graph, workflow engine, note-schema
/// gate and cascade engine. Every variant maps to one named `code` string
/// the tool dispatcher places in the `error.code` field of the response
/// envelope, and to a classifier used for HTTP-status-style logging.
///
/// # Examples
///
/// ```rust
/// use work_item_core::error::WorkItemError;
///
/// let not_found = WorkItemError::item_not_found(42);
/// assert!(not_found.is_not_found());
/// assert_eq!(not_found.code(), "NOT_FOUND");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkItemError {
    /// Referenced item, note, dependency or transition does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed field-level validation before any store access.
    #[error("validation error: {0}")]
    Validation(String),

    /// A uniqueness or structural invariant would be violated (duplicate
    /// key, max-depth exceeded).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Dependency graph edge would introduce a cycle.
    #[error("dependency cycle detected: {0}")]
    CycleDetected(String),

    /// Target status exists in the active flow but required notes for the
    /// destination role phase are missing.
    #[error("note-schema gate blocked transition: missing {missing:?}")]
    GateBlocked { missing: Vec<String> },

    /// Target transition is blocked by unresolved `BLOCKS` dependencies.
    #[error("blocked by unresolved dependencies: {blockers:?}")]
    DependenciesNotResolved { blockers: Vec<i64> },

    /// The requested trigger has no resolution in the item's active flow
    /// from its current status (includes `resume` with no prior
    /// non-blocked status to restore).
    #[error("no transition available: {0}")]
    NoTransitionAvailable(String),

    /// A cascade would recurse past the configured depth cap.
    #[error("cascade depth exceeded for item {item_id}")]
    CascadeDepthExceeded { item_id: i64 },

    /// Bounded retry for a contended write was exhausted.
    #[error("concurrency budget exhausted")]
    ConcurrencyExhausted,

    /// Underlying storage engine error.
    #[error("database error: {0}")]
    Database(String),

    /// Malformed or missing configuration (flow/note-schema YAML).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything else — should be rare and is always a bug or an
    /// unrecoverable environment problem.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkItemError {
    pub fn item_not_found(id: i64) -> Self {
        Self::NotFound(format!("work item {id} not found"))
    }

    pub fn note_not_found(item_id: i64, key: &str) -> Self {
        Self::NotFound(format!("note '{key}' on item {item_id} not found"))
    }

    pub fn dependency_not_found(id: i64) -> Self {
        Self::NotFound(format!("dependency {id} not found"))
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn max_depth_exceeded(parent_id: i64) -> Self {
        Self::Conflict(format!(
            "item {parent_id} is already at maximum nesting depth"
        ))
    }

    pub fn duplicate_dependency(from_item_id: i64, to_item_id: i64) -> Self {
        Self::Conflict(format!(
            "dependency from {from_item_id} to {to_item_id} already exists"
        ))
    }

    pub fn self_dependency(item_id: i64) -> Self {
        Self::Validation(format!("item {item_id} cannot depend on itself"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkItemError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkItemError::Validation(_))
    }

    pub fn is_database(&self) -> bool {
        matches!(self, WorkItemError::Database(_))
    }

    pub fn is_gate_blocked(&self) -> bool {
        matches!(self, WorkItemError::GateBlocked { .. })
    }

    /// Stable taxonomy code surfaced in the MCP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            WorkItemError::NotFound(_) => "NOT_FOUND",
            WorkItemError::Validation(_) => "VALIDATION",
            WorkItemError::Conflict(_) => "CONFLICT",
            WorkItemError::CycleDetected(_) => "CYCLE_DETECTED",
            WorkItemError::GateBlocked { .. } => "GATE_BLOCKED",
            WorkItemError::DependenciesNotResolved { .. } => "DEPENDENCIES_NOT_RESOLVED",
            WorkItemError::NoTransitionAvailable(_) => "NO_TRANSITION_AVAILABLE",
            WorkItemError::CascadeDepthExceeded { .. } => "CASCADE_DEPTH_EXCEEDED",
            WorkItemError::ConcurrencyExhausted => "CONCURRENCY_EXHAUSTED",
            WorkItemError::Database(_) => "DATABASE",
            WorkItemError::Configuration(_) => "CONFIGURATION",
            WorkItemError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP-status-style classifier, used only for log level selection —
    /// the MCP response envelope always carries `code()`, never this.
    pub fn status_code(&self) -> u16 {
        match self {
            WorkItemError::NotFound(_) => 404,
            WorkItemError::Validation(_) => 400,
            WorkItemError::Conflict(_) => 409,
            WorkItemError::CycleDetected(_) => 409,
            WorkItemError::GateBlocked { .. } => 422,
            WorkItemError::DependenciesNotResolved { .. } => 422,
            WorkItemError::NoTransitionAvailable(_) => 422,
            WorkItemError::CascadeDepthExceeded { .. } => 422,
            WorkItemError::ConcurrencyExhausted => 503,
            WorkItemError::Database(_) => 500,
            WorkItemError::Configuration(_) => 500,
            WorkItemError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_constructors_produce_readable_messages() {
        let err = WorkItemError::item_not_found(42);
        assert!(err.is_not_found());
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn gate_blocked_carries_missing_keys() {
        let err = WorkItemError::GateBlocked {
            missing: vec!["summary".to_string()],
        };
        assert!(err.is_gate_blocked());
        assert_eq!(err.code(), "GATE_BLOCKED");
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn predicates_are_mutually_exclusive() {
        let err = WorkItemError::Database("disk full".to_string());
        assert!(err.is_database());
        assert!(!err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn concurrency_exhausted_maps_to_service_unavailable() {
        assert_eq!(WorkItemError::ConcurrencyExhausted.status_code(), 503);
        assert_eq!(WorkItemError::ConcurrencyExhausted.code(), "CONCURRENCY_EXHAUSTED");
    }
}
