use serde::{Deserialize, Serialize};

/// Top-level configuration for the tradestream client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub stream: StreamSettings,
    pub credentials: CredentialsConfig,
}

/// Where the analysis backend lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the backend; requests go to `{base_url}/trade`.
    pub base_url: String,
    /// Timeout in seconds for establishing the connection. The stream itself has none.
    pub connect_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout_seconds: 10,
        }
    }
}

/// How the run controller treats the stream lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamSettings {
    /// Treat a transport that closes without `complete`/`error` as a completed run.
    /// When false the run ends `Failed` instead.
    pub implicit_completion: bool,
    /// Fail the run when no record arrives for this many seconds. Unset waits forever.
    pub idle_timeout_seconds: Option<u64>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            implicit_completion: true,
            idle_timeout_seconds: None,
        }
    }
}

/// Local credential cache used by the command-line front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// JSON file holding the stored API keys.
    pub path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: "config/credentials.json".to_string(),
        }
    }
}
