use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;
use tracing::{debug, error, warn};

use crate::decoder::{EventDecoder, LineOutcome};
use crate::state::{StreamState, TRANSPORT_FAILURE_MESSAGE};
use crate::transport::ByteStream;

const LINE_PREVIEW_CHARS: usize = 120;

/// Turns the response body into the sequence of states it produces.
///
/// Yields one snapshot per accepted event, then a final settled snapshot
/// once the body ends (`SettledOk`) or fails (`SettledError`). Rejected
/// lines are logged and produce nothing. Chunks are read one at a time and
/// every line of a chunk is reduced before the next read.
pub fn state_updates(bytes: ByteStream) -> impl futures::Stream<Item = StreamState> + Send {
    struct Driver {
        bytes: ByteStream,
        decoder: EventDecoder,
        state: StreamState,
        pending: VecDeque<StreamState>,
        chunks: u64,
        rejected: u64,
        done: bool,
    }

    impl Driver {
        fn reduce(&mut self, outcomes: Vec<LineOutcome>) {
            for outcome in outcomes {
                match outcome {
                    Ok(event) => {
                        if self.state.apply(&event) {
                            self.pending.push_back(self.state.clone());
                        }
                    }
                    Err(rejected) => {
                        self.rejected += 1;
                        warn!(
                            error = %rejected.error,
                            line = %preview(&rejected.line),
                            "discarding stream line"
                        );
                    }
                }
            }
        }

        fn settle(&mut self, failure: Option<String>) {
            let tail = self.decoder.finish();
            self.reduce(tail);
            match failure {
                Some(detail) => {
                    error!(error = %detail, chunks = self.chunks, "event stream failed");
                    self.state.settle_error(TRANSPORT_FAILURE_MESSAGE);
                }
                None => {
                    if self.state.final_result.is_none() {
                        warn!(chunks = self.chunks, "event stream closed without a final event");
                    }
                    self.state.settle_ok();
                }
            }
            debug!(
                chunks = self.chunks,
                rejected = self.rejected,
                events = self.state.progress_log.len(),
                "event stream settled"
            );
            self.pending.push_back(self.state.clone());
            self.done = true;
        }
    }

    stream::unfold(
        Driver {
            bytes,
            decoder: EventDecoder::new(),
            state: StreamState::active(),
            pending: VecDeque::new(),
            chunks: 0,
            rejected: 0,
            done: false,
        },
        |mut driver| async move {
            loop {
                if let Some(snapshot) = driver.pending.pop_front() {
                    return Some((snapshot, driver));
                }
                if driver.done {
                    return None;
                }

                match driver.bytes.next().await {
                    Some(Ok(chunk)) => {
                        driver.chunks += 1;
                        let outcomes = driver.decoder.push_chunk(&chunk);
                        driver.reduce(outcomes);
                    }
                    Some(Err(err)) => driver.settle(Some(err.to_string())),
                    None => driver.settle(None),
                }
            }
        },
    )
}

fn preview(line: &str) -> String {
    if line.chars().count() <= LINE_PREVIEW_CHARS {
        return line.to_string();
    }
    let mut short: String = line.chars().take(LINE_PREVIEW_CHARS).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::state::Phase;

    fn body(chunks: Vec<Result<&'static str, TransportError>>) -> ByteStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|chunk| chunk.map(|text| bytes::Bytes::from_static(text.as_bytes())))
                .collect::<Vec<_>>(),
        ))
    }

    async fn collect(bytes: ByteStream) -> Vec<StreamState> {
        state_updates(bytes).collect().await
    }

    #[tokio::test]
    async fn two_chunks_split_mid_line() {
        let updates = collect(body(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"search\",\"mess"),
            Ok("age\":\"Searching calendar\"}}\n{\"type\":\"final\",\"data\":{\"message\":\"Done\"}}\n"),
        ]))
        .await;

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].progress_log, vec!["Searching calendar"]);
        assert_eq!(updates[0].status_category, "search");
        assert_eq!(updates[1].final_result.as_deref(), Some("Done"));
        assert_eq!(updates[1].phase, Phase::Active);
        let last = updates.last().expect("settled");
        assert_eq!(last.phase, Phase::SettledOk);
        assert_eq!(last.progress_log, vec!["Searching calendar"]);
        assert_eq!(last.final_result.as_deref(), Some("Done"));
    }

    #[tokio::test]
    async fn malformed_line_produces_no_update() {
        let updates = collect(body(vec![Ok(
            "not json\n{\"type\":\"progress\",\"data\":{\"type\":\"x\",\"message\":\"ok\"}}\n",
        )]))
        .await;

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].progress_log, vec!["ok"]);
        assert_eq!(updates[1].phase, Phase::SettledOk);
        assert!(updates[1].missing_final());
    }

    #[tokio::test]
    async fn transport_error_keeps_received_progress() {
        let updates = collect(body(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"started\"}}\n"),
            Err(TransportError::read("connection reset")),
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"init\",\"message\":\"never\"}}\n"),
        ]))
        .await;

        let last = updates.last().expect("settled");
        assert_eq!(last.phase, Phase::SettledError);
        assert_eq!(last.progress_log, vec!["started"]);
        assert_eq!(last.error_message.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
        assert_eq!(updates.len(), 2);
    }

    #[tokio::test]
    async fn trailing_line_is_flushed_before_settling() {
        let updates = collect(body(vec![Ok(
            "{\"type\":\"final\",\"data\":{\"message\":\"Done\"}}",
        )]))
        .await;

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].phase, Phase::SettledOk);
        assert_eq!(updates[1].final_result.as_deref(), Some("Done"));
    }

    #[tokio::test]
    async fn partial_line_is_flushed_on_transport_error() {
        let updates = collect(body(vec![
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"x\",\"message\":\"tail\"}}"),
            Err(TransportError::read("eof")),
        ]))
        .await;

        let last = updates.last().expect("settled");
        assert_eq!(last.progress_log, vec!["tail"]);
        assert_eq!(last.phase, Phase::SettledError);
    }

    #[tokio::test]
    async fn blank_lines_and_unknown_kinds_are_silent() {
        let updates = collect(body(vec![
            Ok("\n\n  \n{\"type\":\"heartbeat\",\"data\":{}}\n\n"),
            Ok("{\"type\":\"progress\",\"data\":{\"type\":\"x\",\"message\":\"one\"}}\n\n\n"),
        ]))
        .await;

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].progress_log, vec!["one"]);
    }

    #[tokio::test]
    async fn empty_body_settles_ok_without_result() {
        let updates = collect(body(vec![])).await;
        assert_eq!(updates.len(), 1);
        assert!(updates[0].missing_final());
    }

    #[test]
    fn preview_truncates_long_lines() {
        let line = "x".repeat(500);
        let short = preview(&line);
        assert_eq!(short.chars().count(), LINE_PREVIEW_CHARS + 1);
        assert_eq!(preview("short"), "short");
    }
}
