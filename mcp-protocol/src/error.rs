//! Maps [`WorkItemError`] onto the tool dispatcher's named error taxonomy
//! and builds the structured `details` object gate and dependency failures
//! carry so callers can act without a round-trip.

use serde_json::{json, Value};
use work_item_core::error::WorkItemError;

/// One entry of the `error` object in the uniform response envelope.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Classify a [`WorkItemError`] into the dispatcher's `code` vocabulary
/// (`ValidationError`, `NotFound`, `ConflictError`, `GateBlocked`,
/// `DependenciesNotResolved`, `NoTransitionAvailable`,
/// `CascadeDepthExceeded`, `ConcurrencyExhausted`, `DatabaseError`,
/// `InternalError`) and populate `details` for the two codes that carry
/// structured context.
pub fn map_error(err: &WorkItemError) -> ToolError {
    let message = err.to_string();
    match err {
        WorkItemError::NotFound(_) => ToolError { code: "NotFound", message, details: None },
        WorkItemError::Validation(_) => ToolError { code: "ValidationError", message, details: None },
        WorkItemError::Conflict(_) | WorkItemError::CycleDetected(_) => {
            ToolError { code: "ConflictError", message, details: None }
        }
        WorkItemError::GateBlocked { missing } => ToolError {
            code: "GateBlocked",
            message,
            details: Some(json!({ "missing": missing })),
        },
        WorkItemError::DependenciesNotResolved { blockers } => ToolError {
            code: "DependenciesNotResolved",
            message,
            details: Some(json!({ "blockers": blockers })),
        },
        WorkItemError::NoTransitionAvailable(_) => {
            ToolError { code: "NoTransitionAvailable", message, details: None }
        }
        WorkItemError::CascadeDepthExceeded { item_id } => ToolError {
            code: "CascadeDepthExceeded",
            message,
            details: Some(json!({ "itemId": item_id })),
        },
        WorkItemError::ConcurrencyExhausted => {
            ToolError { code: "ConcurrencyExhausted", message, details: None }
        }
        WorkItemError::Database(_) => ToolError { code: "DatabaseError", message, details: None },
        WorkItemError::Configuration(_) | WorkItemError::Internal(_) => {
            ToolError { code: "InternalError", message, details: None }
        }
    }
}

/// Build a `ConflictError` with an explicit cycle path, for the dependency
/// cycle-rejection scenario where `GraphService` only returns a boolean and
/// the dispatcher reconstructs the cycle for the response.
pub fn conflict_with_cycle(message: impl Into<String>, cycle: Vec<i64>) -> ToolError {
    ToolError { code: "ConflictError", message: message.into(), details: Some(json!({ "cycle": cycle })) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocked_carries_missing_keys_in_details() {
        let err = WorkItemError::GateBlocked { missing: vec!["design".to_string()] };
        let mapped = map_error(&err);
        assert_eq!(mapped.code, "GateBlocked");
        assert_eq!(mapped.details.unwrap()["missing"][0], "design");
    }

    #[test]
    fn cycle_detected_maps_to_conflict_error() {
        let err = WorkItemError::CycleDetected("A->B->A".to_string());
        assert_eq!(map_error(&err).code, "ConflictError");
    }

    #[test]
    fn configuration_and_internal_both_map_to_internal_error() {
        assert_eq!(map_error(&WorkItemError::Configuration("bad yaml".to_string())).code, "InternalError");
        assert_eq!(map_error(&WorkItemError::Internal("bug".to_string())).code, "InternalError");
    }
}
