use tracing::{debug, warn};
use tradestream_models::event::Event;
use tradestream_models::run::{LogEntry, LogLevel, RunState};

use crate::error::StreamError;

/// Last stage of the backend pipeline; its update is shown as a success.
pub const FINAL_STAGE_NODE: &str = "Risk Judge";

pub const COMPLETE_TEXT: &str = "Analysis complete.";
pub const START_FAILED_TEXT: &str = "Failed to start trade analysis.";
pub const CANCELLED_TEXT: &str = "Run cancelled.";

/// What recording one event produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub entry: Option<LogEntry>,
    /// Terminal state the run should move to, if this event ends it.
    pub transition: Option<RunState>,
}

/// Renders events and failures as log lines and decides terminal transitions.
#[derive(Debug, Clone, Default)]
pub struct LogRecorder {
    /// Also log unknown records as visible entries instead of only to tracing.
    pub show_unknown: bool,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &Event) -> Recorded {
        match event {
            Event::Update(update) => {
                let level = if update.node == FINAL_STAGE_NODE {
                    LogLevel::Success
                } else {
                    LogLevel::Normal
                };
                Recorded {
                    entry: Some(LogEntry::new(
                        format!("Agent finished: {}", update.node),
                        level,
                    )),
                    transition: None,
                }
            }
            Event::RateLimit(rate) => {
                let text = match (&rate.message, rate.sleep_seconds) {
                    (Some(message), _) => message.clone(),
                    (None, Some(secs)) => format!("Waiting {secs}s"),
                    (None, None) => "Rate limited by backend".to_string(),
                };
                Recorded {
                    entry: Some(LogEntry::new(text, LogLevel::RateLimit)),
                    transition: None,
                }
            }
            Event::Complete => Recorded {
                entry: Some(LogEntry::new(COMPLETE_TEXT, LogLevel::Success)),
                transition: Some(RunState::Completed),
            },
            Event::Error(error) => {
                warn!(message = %error.message, "Backend reported an error");
                Recorded {
                    entry: Some(LogEntry::error(format!("Error: {}", error.message))),
                    transition: Some(RunState::Failed),
                }
            }
            Event::Unknown(raw) => {
                debug!(kind = event.kind(), raw = %raw, "Ignoring unrecognized record");
                Recorded {
                    entry: self.show_unknown.then(|| {
                        LogEntry::normal(format!("Ignored record of type {}", event.kind()))
                    }),
                    transition: None,
                }
            }
        }
    }

    /// A record that could not be decoded; the run carries on.
    pub fn record_decode_error(&self, error: &StreamError) -> LogEntry {
        warn!(error = %error, "Skipping malformed record");
        LogEntry::error(format!("Skipped malformed record: {error}"))
    }

    /// The stream could not be opened or broke off; the run fails.
    pub fn record_transport_failure(&self, error: &StreamError, streaming: bool) -> LogEntry {
        warn!(error = %error, streaming, "Transport failure");
        if streaming {
            LogEntry::error(format!("Stream interrupted: {error}"))
        } else {
            LogEntry::error(START_FAILED_TEXT)
        }
    }

    /// The transport closed without a terminal record.
    pub fn record_end_of_stream(&self, implicit_completion: bool) -> Recorded {
        if implicit_completion {
            Recorded {
                entry: Some(LogEntry::new(COMPLETE_TEXT, LogLevel::Success)),
                transition: Some(RunState::Completed),
            }
        } else {
            Recorded {
                entry: Some(LogEntry::error(
                    "Error: stream closed before the analysis finished",
                )),
                transition: Some(RunState::Failed),
            }
        }
    }

    pub fn record_cancelled(&self) -> LogEntry {
        LogEntry::error(CANCELLED_TEXT)
    }
}
