use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use tradestream_models::trade_request::ApiKeys;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Credential file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// On-disk layout: every key lives under one fixed entry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    api_keys: ApiKeys,
}

/// File-backed cache of the API keys submitted with each analysis.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored keys, or an empty set when nothing has been saved.
    pub fn load(&self) -> Result<ApiKeys, CredentialError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credentials");
                return Ok(ApiKeys::new());
            }
            Err(source) => return Err(self.io_error(source)),
        };
        let stored: StoredCredentials =
            serde_json::from_str(&raw).map_err(|source| CredentialError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(stored.api_keys)
    }

    pub fn save(&self, keys: &ApiKeys) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let stored = StoredCredentials {
            api_keys: keys.clone(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|source| {
            CredentialError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(|source| self.io_error(source))?;
        info!(path = %self.path.display(), keys = ?keys.names(), "Stored credentials");
        Ok(())
    }

    /// Forget stored keys. Returns whether anything was removed.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared stored credentials");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
