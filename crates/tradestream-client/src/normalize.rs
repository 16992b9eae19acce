use serde_json::Value;

/// Canonical text for a report value of any shape.
///
/// Rules, first match wins:
/// - absent or `null` → empty text
/// - a string → itself
/// - an object whose `content` is a string → that string (LLM message objects)
/// - anything else → its compact JSON serialization
pub fn normalize_content(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => match other.get("content") {
            Some(Value::String(content)) => content.clone(),
            _ => other.to_string(),
        },
    }
}
