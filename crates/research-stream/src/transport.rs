use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, TransportError};
use crate::request::ResearchRequest;

/// Response body as a stream of raw chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Opens the byte stream for a research request.
///
/// Implementations only move bytes; decoding happens downstream. Dropping
/// the returned stream must release the underlying connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &ResearchRequest) -> Result<ByteStream, TransportError>;
}

/// HTTP transport that POSTs the request as JSON and streams the response.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ResearchRequest) -> Result<ByteStream, TransportError> {
        let url = self.config.workflow_url();
        debug!(%url, mode = request.mode(), "opening workflow stream");

        let response = self
            .client
            .post(&url)
            .header(
                reqwest::header::ACCEPT,
                "application/x-ndjson, application/json",
            )
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string())))
            .boxed())
    }
}
