use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::AggregateResult;

/// Lifecycle of one analysis run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Streaming => "streaming",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a log line should be presented.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Normal,
    RateLimit,
    Error,
    Success,
}

/// One human-readable line of run activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, level: LogLevel) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
            level,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, LogLevel::Normal)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, LogLevel::Error)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}

/// Immutable view of a run, published whole after every processed record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub ticker: String,
    pub state: RunState,
    pub result: AggregateResult,
    pub logs: Vec<LogEntry>,
}

impl RunSnapshot {
    /// Snapshot of a run that has just started streaming.
    pub fn started(run_id: Uuid, ticker: impl Into<String>) -> Self {
        Self {
            run_id,
            ticker: ticker.into(),
            state: RunState::Streaming,
            result: AggregateResult::default(),
            logs: Vec::new(),
        }
    }

    pub fn log_texts(&self) -> Vec<&str> {
        self.logs.iter().map(|e| e.text.as_str()).collect()
    }
}
