use serde_json::{Map, Value};

/// One decoded record from the analysis stream.
///
/// Unrecognised records are kept as `Unknown` with their raw JSON so new
/// server-side variants never break the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Update(UpdateEvent),
    RateLimit(RateLimitEvent),
    Complete,
    Error(ErrorEvent),
    Unknown(Value),
}

impl Event {
    /// Wire discriminator for this event, or the raw `type` of an unknown record.
    pub fn kind(&self) -> &str {
        match self {
            Event::Update(_) => "update",
            Event::RateLimit(_) => "rate_limit",
            Event::Complete => "complete",
            Event::Error(_) => "error",
            Event::Unknown(raw) => raw.get("type").and_then(Value::as_str).unwrap_or("<none>"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Complete | Event::Error(_))
    }
}

/// A pipeline node finished and reported the state keys it changed.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub node: String,
    pub data: Map<String, Value>,
}

/// The backend is throttling its LLM calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitEvent {
    pub message: Option<String>,
    pub sleep_seconds: Option<f64>,
    pub request_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub message: String,
}
