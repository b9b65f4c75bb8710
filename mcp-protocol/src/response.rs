//! The uniform tool response envelope: `{ok, data, message?}` on success,
//! `{ok, summary, results}` for a batch, `{ok: false, error, data: null}`
//! on failure.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{map_error, ToolError};

/// `{ok: true, data, message?}`.
pub fn success(data: impl Serialize) -> Value {
    json!({ "ok": true, "data": data, "message": Value::Null })
}

pub fn success_with_message(data: impl Serialize, message: impl Into<String>) -> Value {
    json!({ "ok": true, "data": data, "message": message.into() })
}

/// `{ok: false, error: {code, message, details?}, data: null}`.
pub fn failure(err: &ToolError) -> Value {
    json!({ "ok": false, "data": Value::Null, "error": err })
}

/// Map a [`work_item_core::error::WorkItemError`] straight to the failure
/// envelope.
pub fn failure_from(err: &work_item_core::error::WorkItemError) -> Value {
    failure(&map_error(err))
}

/// One element of a batch `results` array: either `{ok: true, data}` or
/// `{ok: false, error}`, keyed by the caller-supplied index so a partial
/// batch failure is traceable back to its input position.
pub fn batch_entry(index: usize, result: Result<Value, work_item_core::error::WorkItemError>) -> Value {
    match result {
        Ok(data) => json!({ "index": index, "ok": true, "data": data }),
        Err(err) => json!({ "index": index, "ok": false, "error": map_error(&err) }),
    }
}

/// `{ok: true, summary: {total, succeeded, failed}, results: [...]}`. Batch
/// success is reported even when some elements failed — only the top-level
/// `ok` flag, which always stays `true` for a batch call that ran to
/// completion, distinguishes this from a single-item failure envelope.
pub fn batch_success(results: Vec<Value>) -> Value {
    let total = results.len();
    let failed = results.iter().filter(|r| r["ok"] == false).count();
    let succeeded = total - failed;
    json!({
        "ok": true,
        "summary": { "total": total, "succeeded": succeeded, "failed": failed },
        "results": results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use work_item_core::error::WorkItemError;

    #[test]
    fn success_envelope_has_null_message_by_default() {
        let env = success(json!({"id": 1}));
        assert_eq!(env["ok"], true);
        assert!(env["message"].is_null());
    }

    #[test]
    fn batch_success_counts_failures() {
        let results = vec![
            batch_entry(0, Ok(json!({"id": 1}))),
            batch_entry(1, Err(WorkItemError::item_not_found(99))),
        ];
        let env = batch_success(results);
        assert_eq!(env["summary"]["total"], 2);
        assert_eq!(env["summary"]["succeeded"], 1);
        assert_eq!(env["summary"]["failed"], 1);
    }

    #[test]
    fn failure_envelope_carries_mapped_code() {
        let env = failure_from(&WorkItemError::GateBlocked { missing: vec!["design".into()] });
        assert_eq!(env["ok"], false);
        assert_eq!(env["error"]["code"], "GateBlocked");
        assert_eq!(env["error"]["details"]["missing"][0], "design");
    }
}
