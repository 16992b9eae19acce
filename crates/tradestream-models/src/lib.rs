pub mod aggregate;
pub mod config;
pub mod event;
pub mod run;
pub mod trade_request;

pub use aggregate::{AggregateResult, DebateField, DebateHistory, ReportField};
pub use config::{ClientConfig, CredentialsConfig, ServerConfig, StreamSettings};
pub use event::{ErrorEvent, Event, RateLimitEvent, UpdateEvent};
pub use run::{LogEntry, LogLevel, RunSnapshot, RunState};
pub use trade_request::{ApiKeys, TradeRequest};
