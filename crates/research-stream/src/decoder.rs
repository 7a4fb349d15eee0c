use crate::errors::LineError;
use crate::event::{EventRecord, parse_line};
use crate::framer::LineFramer;
use crate::text::Utf8Decoder;

/// A line that could not be turned into an event.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedLine {
    pub line: String,
    pub error: LineError,
}

/// Outcome of one non-blank line.
pub type LineOutcome = Result<EventRecord, RejectedLine>;

/// Byte-to-event decoder for one request: UTF-8 decoding, line framing and
/// per-line parsing.
///
/// Feeding a byte sequence in any chunking yields the same ordered
/// outcomes as feeding it whole.
#[derive(Debug, Default)]
pub struct EventDecoder {
    text: Utf8Decoder,
    framer: LineFramer,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one transport chunk into the outcomes of every line it
    /// completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<LineOutcome> {
        let text = self.text.decode(chunk);
        parse_lines(self.framer.push(&text))
    }

    /// Flushes held-back bytes and the unterminated last line at end of
    /// stream.
    pub fn finish(&mut self) -> Vec<LineOutcome> {
        let tail = self.text.finish();
        let mut lines = self.framer.push(&tail);
        lines.extend(self.framer.finish());
        parse_lines(lines)
    }
}

fn parse_lines(lines: Vec<String>) -> Vec<LineOutcome> {
    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(&line).map_err(|error| RejectedLine { line, error }))
        .collect()
}
