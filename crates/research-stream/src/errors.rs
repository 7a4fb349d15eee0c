/// Failures of the byte transport. Any of these is fatal to the current
/// request and settles it with an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent (connect, DNS, TLS, ...).
    #[error("request failed: {message}")]
    Request { message: String },
    /// The workflow service answered with a non-success status.
    #[error("workflow service returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response carried no body to stream from.
    #[error("response has no body")]
    MissingBody,
    /// Reading the body failed after the stream had started.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates a send/connect error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a mid-stream read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }
}

/// Rejection of a single stream line. Recoverable: the line is dropped and
/// decoding carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    /// The line is not a JSON event envelope (`type` + `data`).
    #[error("invalid event JSON: {message}")]
    InvalidJson { message: String },
    /// The envelope parsed but its `data` does not fit the event kind.
    #[error("invalid `{kind}` payload: {message}")]
    InvalidPayload { kind: String, message: String },
    /// The producer sent an event kind this client does not know.
    #[error("unknown event kind `{kind}`")]
    UnknownKind { kind: String },
}

/// Errors returned by the client API itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The request failed validation before anything was sent.
    #[error("validation error: {0}")]
    Validation(String),
    /// Another request is still active.
    #[error("a research request is already in progress")]
    Busy,
    /// The run task ended without publishing a settled state.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
