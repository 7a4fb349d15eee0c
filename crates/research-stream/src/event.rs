use std::fmt;

use serde::Deserialize;

use crate::errors::LineError;

/// Kinds of event this client understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Interim status update.
    Progress,
    /// Terminal result of the workflow.
    Final,
}

impl EventKind {
    /// Wire name of the kind (the envelope's `type` value).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Final => "final",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "progress" => Some(Self::Progress),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a progress event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProgressPayload {
    /// Workflow step that produced the update (`init`, `research`, ...).
    #[serde(rename = "type", default)]
    pub category: String,
    /// Human-readable status line.
    pub message: String,
}

/// Final message as sent by the producer: plain text or any JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum FinalMessage {
    Text(String),
    Structured(serde_json::Value),
}

impl FinalMessage {
    /// Text for display. Structured values render as compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// One parsed line of the event stream.
#[derive(Clone, Debug, PartialEq)]
pub enum EventRecord {
    Progress(ProgressPayload),
    Final(FinalMessage),
}

impl EventRecord {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Progress(_) => EventKind::Progress,
            Self::Final(_) => EventKind::Final,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: serde_json::Value,
}

/// Parses one complete, non-blank line into an [`EventRecord`].
///
/// Nothing is applied on failure; the caller reports the error and moves
/// on to the next line.
pub fn parse_line(line: &str) -> Result<EventRecord, LineError> {
    let envelope: Envelope =
        serde_json::from_str(line).map_err(|e| LineError::InvalidJson {
            message: e.to_string(),
        })?;
    let Some(kind) = EventKind::from_wire(&envelope.kind) else {
        return Err(LineError::UnknownKind {
            kind: envelope.kind,
        });
    };
    match kind {
        EventKind::Progress => serde_json::from_value::<ProgressPayload>(envelope.data)
            .map(EventRecord::Progress)
            .map_err(|e| LineError::InvalidPayload {
                kind: kind.to_string(),
                message: e.to_string(),
            }),
        EventKind::Final => Ok(EventRecord::Final(final_message(envelope.data))),
    }
}

// `{"message": ...}` unwraps to its message; any other value is the result
// itself.
fn final_message(data: serde_json::Value) -> FinalMessage {
    let value = match data {
        serde_json::Value::Object(mut fields) if fields.contains_key("message") => fields
            .remove("message")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };
    match value {
        serde_json::Value::String(text) => FinalMessage::Text(text),
        other => FinalMessage::Structured(other),
    }
}
