use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Malformed record {preview:?}: {reason}")]
    Decode { preview: String, reason: String },

    #[error("No record received for {0} seconds")]
    Stalled(u64),
}

impl StreamError {
    /// Decode failures only cost one record; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamError::Decode { .. })
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => StreamError::Status(status.as_u16()),
            None => StreamError::Transport(e.to_string()),
        }
    }
}
