use std::str::FromStr;
use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_WORKFLOW_PATH: &str = "/api/run-workflow";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STREAM_BUFFER: usize = 64;

/// Configuration for the workflow service client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the workflow service.
    pub base_url: String,
    /// Path of the streaming workflow endpoint.
    pub workflow_path: String,
    /// Limit on establishing the connection. The body stream itself is not
    /// time-bounded.
    pub connect_timeout: Duration,
    /// Snapshots buffered between the stream task and the consumer.
    pub stream_buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    /// Creates a config with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            workflow_path: DEFAULT_WORKFLOW_PATH.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Builds a config from `RESEARCH_*` environment variables.
    ///
    /// - `RESEARCH_API_URL` (default `http://localhost:5000`)
    /// - `RESEARCH_WORKFLOW_PATH` (default `/api/run-workflow`)
    /// - `RESEARCH_CONNECT_TIMEOUT_SECS` (default 10)
    /// - `RESEARCH_STREAM_BUFFER` (default 64)
    pub fn from_env() -> Result<Self, ClientError> {
        let config = Self {
            base_url: env_or("RESEARCH_API_URL", DEFAULT_BASE_URL.to_string()),
            workflow_path: env_or("RESEARCH_WORKFLOW_PATH", DEFAULT_WORKFLOW_PATH.to_string()),
            connect_timeout: Duration::from_secs(env_or(
                "RESEARCH_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            stream_buffer_capacity: env_or("RESEARCH_STREAM_BUFFER", DEFAULT_STREAM_BUFFER),
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn workflow_path(mut self, path: impl Into<String>) -> Self {
        self.workflow_path = path.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(ClientError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn workflow_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.workflow_path.trim_start_matches('/')
        )
    }
}

/// Loads `.env` from the working directory, if there is one.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "unparsable environment value, using default");
                default
            }
        },
        _ => default,
    }
}
