use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, warn};
use tradestream_models::config::ServerConfig;
use tradestream_models::trade_request::TradeRequest;

use crate::error::StreamError;

/// Raw response body, chunked however the transport delivers it.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, StreamError>>;

/// Opens the analysis stream for a request. Mockable for testing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &TradeRequest) -> Result<ChunkStream, StreamError>;
}

/// `POST {base_url}/trade` over HTTP, streaming the chunked NDJSON response.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| StreamError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/trade", self.base_url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &TradeRequest) -> Result<ChunkStream, StreamError> {
        let url = self.endpoint();
        debug!(%url, ticker = %request.ticker, keys = ?request.api_keys.names(), "Opening analysis stream");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Backend refused analysis request");
            return Err(StreamError::Status(status.as_u16()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(StreamError::from));
        Ok(body.boxed())
    }
}
