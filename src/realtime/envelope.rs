use crate::model::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Server → Client events, discriminated by the `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "new_message")]
    NewMessage { message: Message },
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage { .. } => "new_message",
        }
    }
}

/// Client → Server messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "ping")]
    Ping,
}

/// A decoded inbound frame.
///
/// Every variant is delivered to listeners; only frames that are not JSON
/// at all are dropped (see [`FrameError`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Known `type` whose body matched its schema
    Event(ServerEvent),
    /// Known `type` whose body did not match its schema
    Invalid {
        kind: String,
        reason: String,
        raw: Value,
    },
    /// Missing or unknown `type`
    Unrecognized { kind: Option<String>, raw: Value },
}

impl Inbound {
    /// Value of the `type` field, if any
    pub fn kind(&self) -> Option<&str> {
        match self {
            Inbound::Event(event) => Some(event.kind()),
            Inbound::Invalid { kind, .. } => Some(kind),
            Inbound::Unrecognized { kind, .. } => kind.as_deref(),
        }
    }

    pub fn event(&self) -> Option<&ServerEvent> {
        match self {
            Inbound::Event(event) => Some(event),
            _ => None,
        }
    }
}

/// Frame-level decode failures
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Frame was not valid JSON
    Malformed(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed(reason) => write!(f, "malformed frame: {}", reason),
        }
    }
}

impl std::error::Error for FrameError {}

const KNOWN_KINDS: &[&str] = &["new_message"];

/// Decode one text frame into an [`Inbound`] envelope.
pub fn decode_frame(text: &str) -> Result<Inbound, FrameError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let kind = raw.get("type").and_then(Value::as_str).map(str::to_string);

    match kind {
        Some(kind) if KNOWN_KINDS.contains(&kind.as_str()) => {
            match serde_json::from_value::<ServerEvent>(raw.clone()) {
                Ok(event) => Ok(Inbound::Event(event)),
                Err(e) => Ok(Inbound::Invalid {
                    kind,
                    reason: e.to_string(),
                    raw,
                }),
            }
        }
        kind => Ok(Inbound::Unrecognized { kind, raw }),
    }
}
