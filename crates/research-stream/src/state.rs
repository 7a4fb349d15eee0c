use serde::Serialize;
use tracing::{debug, warn};

use crate::event::EventRecord;

/// Status category recorded once the final event arrives.
pub const FINAL_STATUS_CATEGORY: &str = "final";
/// Message shown when the transport fails.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Error analyzing meetings. Please try again.";
/// Message shown when the consumer cancels the request.
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

/// Lifecycle of one request's stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Active,
    SettledOk,
    SettledError,
}

impl Phase {
    pub fn is_settled(self) -> bool {
        matches!(self, Self::SettledOk | Self::SettledError)
    }
}

/// State accumulated from one request's events, as seen by the
/// presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamState {
    pub phase: Phase,
    /// Category of the last progress event, or [`FINAL_STATUS_CATEGORY`].
    pub status_category: String,
    /// Progress messages in arrival order, duplicates included.
    pub progress_log: Vec<String>,
    /// Set at most once, by the first final event.
    pub final_result: Option<String>,
    pub error_message: Option<String>,
}

impl StreamState {
    /// Fresh state for a newly submitted request (`Idle -> Active`).
    pub fn active() -> Self {
        let mut state = Self::default();
        state.begin();
        state
    }

    /// Resets everything and enters `Active`.
    pub fn begin(&mut self) {
        *self = Self {
            phase: Phase::Active,
            ..Self::default()
        };
    }

    /// Folds one event into the state. Returns whether anything changed.
    pub fn apply(&mut self, event: &EventRecord) -> bool {
        if self.phase != Phase::Active {
            warn!(phase = ?self.phase, kind = %event.kind(), "event outside an active stream ignored");
            return false;
        }
        match event {
            EventRecord::Progress(progress) => {
                self.status_category.clone_from(&progress.category);
                self.progress_log.push(progress.message.clone());
                debug!(category = %progress.category, entries = self.progress_log.len(), "progress");
                true
            }
            EventRecord::Final(_) if self.final_result.is_some() => {
                warn!("duplicate final event ignored");
                false
            }
            EventRecord::Final(message) => {
                self.status_category = FINAL_STATUS_CATEGORY.to_string();
                self.final_result = Some(message.to_display_string());
                debug!("final result received");
                true
            }
        }
    }

    /// Normal end of stream. A missing final event is not an error here.
    pub fn settle_ok(&mut self) {
        if self.phase.is_settled() {
            return;
        }
        self.phase = Phase::SettledOk;
    }

    /// Unrecoverable failure; keeps whatever progress was already received.
    pub fn settle_error(&mut self, message: impl Into<String>) {
        if self.phase.is_settled() {
            return;
        }
        self.phase = Phase::SettledError;
        self.error_message = Some(message.into());
    }

    pub fn is_settled(&self) -> bool {
        self.phase.is_settled()
    }

    /// Settled successfully but the producer never sent a final event.
    pub fn missing_final(&self) -> bool {
        self.phase == Phase::SettledOk && self.final_result.is_none()
    }
}
