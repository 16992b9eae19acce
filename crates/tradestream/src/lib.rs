//! tradestream - streaming client for a multi-agent trade analysis backend
//!
//! Posts a ticker and a set of API keys to the backend's `/trade` endpoint and
//! folds the NDJSON progress stream into a consolidated analysis result plus a
//! human-readable activity log.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tradestream::models::config::ClientConfig;
//! use tradestream::models::trade_request::{ApiKeys, TradeRequest};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let controller = tradestream::build_controller(&ClientConfig::default())?;
//! let snapshot = controller
//!     .run(TradeRequest::new("nvda", ApiKeys::from_env()))
//!     .await;
//! println!("{}", snapshot.state);
//! # Ok(())
//! # }
//! ```

pub mod credentials;

pub use tradestream_client as client;
pub use tradestream_models as models;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tradestream_client::{HttpTransport, RunController};
use tradestream_models::config::ClientConfig;

/// Build a RunController talking HTTP to the configured backend.
pub fn build_controller(config: &ClientConfig) -> Result<RunController, anyhow::Error> {
    let transport = HttpTransport::new(&config.server).context("Failed to build HTTP client")?;
    Ok(RunController::new(
        Arc::new(transport),
        config.stream.clone(),
    ))
}

/// Read the TOML config at `path`, or the defaults when no such file exists.
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig, anyhow::Error> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(ClientConfig::default());
    }
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&config_str).with_context(|| "Failed to parse config")
}
