//! Turning raw model text into a JSON action value.
use serde_json::{json, Value};

use crate::errors::{PilotError, PilotResult};

/// Strips a surrounding ```json fence if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Decodes model output into a JSON object.
pub fn decode_output(raw: &str) -> PilotResult<Value> {
    let cleaned = strip_code_fence(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| PilotError::Decode(format!("model output is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(PilotError::Decode(format!(
            "model output is JSON but not an object: {cleaned}"
        )));
    }
    Ok(value)
}

/// Stand-in record for output that could not be decoded. Fed back to the model
/// as its own previous turn.
pub fn error_value(raw: &str, reason: &str) -> Value {
    json!({
        "error": "output format error",
        "reason": reason,
        "raw": raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object() {
        let v = decode_output(r#"{"POINT":[10,20],"thought":"tap"}"#).unwrap();
        assert_eq!(v["POINT"], json!([10, 20]));
    }

    #[test]
    fn fenced_json_object() {
        let v = decode_output("```json\n{\"PRESS\":\"HOME\"}\n```").unwrap();
        assert_eq!(v["PRESS"], "HOME");
    }

    #[test]
    fn rejects_non_json_and_non_objects() {
        assert!(matches!(decode_output("I will tap the button"), Err(PilotError::Decode(_))));
        assert!(matches!(decode_output("[1,2]"), Err(PilotError::Decode(_))));
    }

    #[test]
    fn error_value_keeps_raw_text() {
        let v = error_value("tap it", "not json");
        assert_eq!(v["raw"], "tap it");
        assert!(v.get("task_completed").is_none());
    }
}
