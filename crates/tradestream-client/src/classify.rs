use serde_json::{Map, Value};
use tradestream_models::event::{ErrorEvent, Event, RateLimitEvent, UpdateEvent};

use crate::normalize::normalize_content;

/// Node name used when an update arrives without one.
pub const UNNAMED_NODE: &str = "unknown";

/// Message used when an error record carries no text.
pub const GENERIC_ERROR: &str = "Unknown server error";

/// Turn one decoded record into an [`Event`] by its `type` field.
///
/// The `type` alone picks the variant. Each field is read on its own and a
/// field of the wrong JSON type counts as absent; extra fields are ignored.
/// Records with an unrecognised or missing `type` become `Event::Unknown`
/// carrying the raw value, as does an `update` whose `data` is not a mapping.
pub fn classify(value: Value) -> Event {
    let classified = match value.get("type").and_then(Value::as_str) {
        Some("update") => update(&value),
        Some("rate_limit") => Some(rate_limit(&value)),
        Some("complete") => Some(Event::Complete),
        Some("error") => Some(error(&value)),
        _ => None,
    };

    classified.unwrap_or(Event::Unknown(value))
}

fn update(value: &Value) -> Option<Event> {
    let data = match value.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(data)) => data.clone(),
        Some(_) => return None,
    };
    let node = value
        .get("node")
        .and_then(Value::as_str)
        .unwrap_or(UNNAMED_NODE)
        .to_string();
    Some(Event::Update(UpdateEvent { node, data }))
}

fn rate_limit(value: &Value) -> Event {
    Event::RateLimit(RateLimitEvent {
        message: value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string),
        sleep_seconds: value.get("sleep_time").and_then(Value::as_f64),
        request_number: value.get("request_number").and_then(Value::as_u64),
    })
}

// A structured `error` payload is still an error; render it as text.
fn error(value: &Value) -> Event {
    let message = normalize_content(value.get("error"));
    let message = if message.trim().is_empty() {
        GENERIC_ERROR.to_string()
    } else {
        message
    };
    Event::Error(ErrorEvent { message })
}
