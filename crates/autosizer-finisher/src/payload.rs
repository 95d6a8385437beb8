// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finishers for buffered (non-streaming) JSON replies.

use autosizer_core::types::TrimPlan;
use serde_json::{Map, Value};
use tracing::info;

use crate::boundary::{finish_cutoff_text, finish_short_text};

/// Rewrite the string at `response` and at `message.content` with `f`.
///
/// Returns whether either field changed.
fn rewrite_text_fields(payload: &mut Map<String, Value>, f: impl Fn(&str) -> String) -> bool {
    let mut changed = false;

    if let Some(Value::String(text)) = payload.get_mut("response") {
        let finished = f(text);
        if finished != *text {
            *text = finished;
            changed = true;
        }
    }

    if let Some(Value::String(text)) = payload
        .get_mut("message")
        .and_then(Value::as_object_mut)
        .and_then(|m| m.get_mut("content"))
    {
        let finished = f(text);
        if finished != *text {
            *text = finished;
            changed = true;
        }
    }

    changed
}

/// Trim a short-mode reply to the plan's sentence and character limits.
pub fn apply_short_response_finisher(payload: &mut Map<String, Value>, plan: &TrimPlan) -> bool {
    let changed = rewrite_text_fields(payload, |text| finish_short_text(text, plan));
    if changed {
        info!(
            sentences = plan.sentence_limit,
            tail = plan.tail_token_allowance,
            "finished short reply"
        );
    }
    changed
}

/// Repair a reply whose `done_reason` is `"length"`.
pub fn apply_length_cutoff_finisher(payload: &mut Map<String, Value>) -> bool {
    if payload.get("done_reason").and_then(Value::as_str) != Some("length") {
        return false;
    }

    let changed = rewrite_text_fields(payload, finish_cutoff_text);
    if changed {
        info!(done_reason = "length", "finished cut-off reply");
    }
    changed
}

/// Run both finishers over a buffered upstream body.
///
/// Returns the re-serialized body when something changed, or `None` when the
/// original bytes should be forwarded untouched (non-JSON content type,
/// unparseable body, non-object payload, or nothing to fix).
pub fn finish_json_body(
    content_type: Option<&str>,
    body: &[u8],
    plan: Option<&TrimPlan>,
) -> Option<Vec<u8>> {
    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if !is_json {
        return None;
    }

    let Ok(Value::Object(mut payload)) = serde_json::from_slice::<Value>(body) else {
        return None;
    };

    let mut changed = false;
    if let Some(plan) = plan {
        changed |= apply_short_response_finisher(&mut payload, plan);
    }
    changed |= apply_length_cutoff_finisher(&mut payload);

    if !changed {
        return None;
    }
    serde_json::to_vec(&payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn plan() -> TrimPlan {
        TrimPlan {
            sentence_limit: 1,
            base_token_budget: Some(160),
            tail_token_allowance: 0,
            chars_per_token: 4.0,
        }
    }

    #[test]
    fn cutoff_finisher_ignores_other_reasons() {
        let mut payload = object(json!({"response": "One. Two. Three.", "done_reason": "stop"}));
        let before = payload.clone();
        assert!(!apply_length_cutoff_finisher(&mut payload));
        assert_eq!(payload, before);
    }

    #[test]
    fn cutoff_finisher_repairs_response() {
        let mut payload = object(json!({"response": "One. Two. Thr", "done_reason": "length"}));
        assert!(apply_length_cutoff_finisher(&mut payload));
        assert_eq!(
            Value::Object(payload),
            json!({"response": "One. Two. ...", "done_reason": "length"})
        );
    }

    #[test]
    fn cutoff_finisher_repairs_chat_message() {
        let mut payload = object(json!({
            "message": {"role": "assistant", "content": "Sure thing. Let me"},
            "done_reason": "length"
        }));
        assert!(apply_length_cutoff_finisher(&mut payload));
        assert_eq!(payload["message"]["content"], json!("Sure thing. ..."));
        assert_eq!(payload["message"]["role"], json!("assistant"));
    }

    #[test]
    fn short_finisher_touches_both_fields() {
        let mut payload = object(json!({
            "response": "A. B.",
            "message": {"content": "C. D."}
        }));
        assert!(apply_short_response_finisher(&mut payload, &plan()));
        assert_eq!(payload["response"], json!("A."));
        assert_eq!(payload["message"]["content"], json!("C."));
    }

    #[test]
    fn short_finisher_reports_no_change() {
        let mut payload = object(json!({"response": "Only one."}));
        assert!(!apply_short_response_finisher(&mut payload, &plan()));
    }

    #[test]
    fn json_body_is_rewritten_when_changed() {
        let body = br#"{"response":"One. Two. Thr","done":true,"done_reason":"length"}"#;
        let out = finish_json_body(Some("application/json; charset=utf-8"), body, None).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["response"], json!("One. Two. ..."));
    }

    #[test]
    fn json_body_untouched_cases() {
        let body = br#"{"response":"Fine.","done_reason":"stop"}"#;
        assert!(finish_json_body(Some("application/json"), body, Some(&plan())).is_none());
        assert!(finish_json_body(Some("text/plain"), b"One. Two", Some(&plan())).is_none());
        assert!(finish_json_body(None, body, None).is_none());
        assert!(finish_json_body(Some("application/json"), b"not json", None).is_none());
        assert!(finish_json_body(Some("application/json"), b"[1,2]", None).is_none());
    }
}
