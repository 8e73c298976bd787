//! Message body encoding.
//!
//! The body is the event's named attributes, with the positional extras
//! added under `args` when there are any.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::event::Event;

/// Payload key holding the positional extras.
pub const ARGS_KEY: &str = "args";

/// Body formats the bridge can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
}

impl PayloadFormat {
    /// MIME type set on published messages.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
        }
    }

    /// Encode an event's payload document in this format.
    pub fn encode(self, event: &Event) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(&payload_document(event))?),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            other => Err(EncodeError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Build the payload document for an event.
pub fn payload_document(event: &Event) -> Map<String, Value> {
    let mut data = event.attributes.clone();
    if !event.args.is_empty() {
        data.insert(ARGS_KEY.to_string(), Value::Array(event.args.clone()));
    }
    data
}

/// Encode an event's payload in the format named by `format`.
///
/// The format name is checked on every call since the configuration it
/// comes from is re-read on reconnect.
pub fn serialize(event: &Event, format: &str) -> Result<Vec<u8>, EncodeError> {
    format.parse::<PayloadFormat>()?.encode(event)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
