use std::io::{self, Write};

use research_stream::{Phase, StreamState};

/// How snapshots are written to stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress lines followed by the result.
    Text,
    /// Every snapshot as one JSON line.
    Json,
}

/// Writes snapshots incrementally, printing only what changed since the
/// previous one.
pub struct Renderer<W: Write> {
    out: W,
    format: OutputFormat,
    printed_progress: usize,
    printed_final: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            printed_progress: 0,
            printed_final: false,
        }
    }

    pub fn render(&mut self, state: &StreamState) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, state)?;
                writeln!(self.out)?;
            }
            OutputFormat::Text => self.render_text(state)?,
        }
        self.out.flush()
    }

    fn render_text(&mut self, state: &StreamState) -> io::Result<()> {
        if state.phase == Phase::Active && self.printed_progress == 0 && state.progress_log.is_empty()
        {
            writeln!(self.out, "Processing, please wait...")?;
        }
        let category = category_label(&state.status_category);
        for message in state.progress_log.iter().skip(self.printed_progress) {
            writeln!(self.out, "[{category}] {message}")?;
        }
        self.printed_progress = state.progress_log.len();

        if !self.printed_final
            && let Some(result) = &state.final_result
        {
            writeln!(self.out, "\n{result}")?;
            self.printed_final = true;
        }
        match state.phase {
            Phase::SettledError => {
                let message = state.error_message.as_deref().unwrap_or("Request failed.");
                writeln!(self.out, "error: {message}")?;
            }
            Phase::SettledOk if state.final_result.is_none() => {
                writeln!(self.out, "The stream ended without a final result.")?;
            }
            _ => {}
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// `calendar_data_retrieval` -> `calendar data retrieval`.
fn category_label(category: &str) -> String {
    if category.is_empty() {
        "progress".to_string()
    } else {
        category.replace('_', " ")
    }
}
