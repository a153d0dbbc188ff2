// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Locating the structured payload inside a tool result.

use serde_json::{json, Value};

/// Message used when a tool returns nothing usable.
pub const GENERIC_SUCCESS: &str = "Tool executed successfully.";

/// Pull the payload to format out of a raw `tools/call` result.
///
/// Order: `structuredContent`, the first text content that parses as a JSON
/// object, the top-level `message`, then a generic success message. The last
/// two come back as `{"message": ...}`.
pub fn extract_payload(result: Option<&Value>) -> Value {
    let Some(result) = result else {
        return json!({ "message": GENERIC_SUCCESS });
    };

    if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
        return structured.clone();
    }

    if let Some(parsed) = first_json_text(result) {
        return parsed;
    }

    match result.get("message").and_then(Value::as_str) {
        Some(message) => json!({ "message": message }),
        None => json!({ "message": GENERIC_SUCCESS }),
    }
}

fn first_json_text(result: &Value) -> Option<Value> {
    let text = result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()?;

    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_content_first() {
        let result = json!({
            "structuredContent": {"whistles": []},
            "content": [{"type": "text", "text": "{\"other\": true}"}]
        });
        assert_eq!(extract_payload(Some(&result)), json!({"whistles": []}));
    }

    #[test]
    fn test_text_content_json() {
        let result = json!({
            "content": [
                {"type": "image", "data": "..."},
                {"type": "text", "text": " {\"profile\": {\"name\": \"Asha\"}} "}
            ]
        });
        assert_eq!(extract_payload(Some(&result)), json!({"profile": {"name": "Asha"}}));
    }

    #[test]
    fn test_non_object_text_falls_through() {
        let result = json!({
            "content": [{"type": "text", "text": "[1, 2]"}],
            "message": "Listed"
        });
        assert_eq!(extract_payload(Some(&result)), json!({"message": "Listed"}));
    }

    #[test]
    fn test_generic_message() {
        let result = json!({"content": [{"type": "text", "text": "done!"}]});
        assert_eq!(extract_payload(Some(&result)), json!({"message": GENERIC_SUCCESS}));
        assert_eq!(extract_payload(None), json!({"message": GENERIC_SUCCESS}));
    }
}
