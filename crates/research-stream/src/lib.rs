//! Client for a research workflow service that streams newline-delimited
//! JSON progress events.
//!
//! Bytes from the response body pass through an incremental UTF-8 decoder,
//! a line framer and a per-line event parser, and are folded into a
//! [`StreamState`] that the caller observes after every accepted event.
//!
//! ```no_run
//! use research_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = ResearchClient::from_config(ClientConfig::from_env()?)?;
//! let mut run = client
//!     .submit(ResearchRequest::manual("monday.com", split_list("Maya Asher")))
//!     .await?;
//!
//! while let Some(state) = run.next_state().await {
//!     if let Some(message) = state.progress_log.last() {
//!         println!("[{}] {message}", state.status_category);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Client handle, single-flight guard and cancellation.
pub mod client;
/// Environment-driven client configuration.
pub mod config;
/// Byte-to-event decoding for one request.
pub mod decoder;
/// Read loop that turns a body stream into state snapshots.
pub mod driver;
/// Error types.
pub mod errors;
/// Event records and the line parser.
pub mod event;
/// Newline framing with a buffered partial line.
pub mod framer;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Request bodies for the two lookup modes.
pub mod request;
/// Stream state and the event reducer.
pub mod state;
/// Incremental UTF-8 decoding across chunk boundaries.
pub mod text;
/// Byte transport contract and the HTTP implementation.
pub mod transport;

pub use client::{AbortHandle, ResearchClient, ResearchRun};
pub use config::ClientConfig;
pub use decoder::{EventDecoder, LineOutcome, RejectedLine};
pub use driver::state_updates;
pub use errors::{ClientError, LineError, TransportError};
pub use event::{EventKind, EventRecord, FinalMessage, ProgressPayload, parse_line};
pub use framer::LineFramer;
pub use request::{AutomaticLookup, ManualEntry, ResearchRequest, split_list};
pub use state::{Phase, StreamState};
pub use text::Utf8Decoder;
pub use transport::{ByteStream, HttpTransport, Transport};
