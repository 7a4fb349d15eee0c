/// Splits decoded text into newline-terminated lines.
///
/// Text after the last newline stays buffered until a later push completes
/// it or [`LineFramer::finish`] flushes it.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    /// Appends `text` and returns every line it completed, in order.
    ///
    /// Lines exclude the terminator (`\n` or `\r\n`). Blank lines are
    /// returned as well; callers skip them before parsing.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        // Only the new text can hold a newline; the buffer never does.
        let Some(offset) = text.rfind('\n') else {
            self.buffer.push_str(text);
            return Vec::new();
        };
        self.buffer.push_str(&text[..=offset]);
        let remainder = text[offset + 1..].to_owned();
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete.lines().map(str::to_owned).collect()
    }

    /// Drains the unterminated remainder at end of stream, if it holds
    /// anything besides whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Text buffered but not yet terminated.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}
