//! Event payloads carried by frames

use super::frame::StreamFrame;
use crate::error::ParseError;
use serde::Deserialize;

/// Payload that ends the event stream for a turn
pub const DONE_SENTINEL: &str = "[DONE]";

/// Typed event carried by a frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Retrieved context; replaces the side-channel field
    Context { content: String },
    /// Answer fragment; appended to the in-progress assistant message
    Answer { content: String },
    /// Any tag this client does not know yet
    #[serde(other)]
    Unknown,
}

/// What a frame asks the router to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Done,
    Event(EventPayload),
}

/// Classify one frame. Only the exact sentinel ends the stream.
pub fn classify(frame: &StreamFrame) -> Result<Disposition, ParseError> {
    if frame.raw == DONE_SENTINEL {
        return Ok(Disposition::Done);
    }
    serde_json::from_str::<EventPayload>(&frame.raw)
        .map(Disposition::Event)
        .map_err(|e| ParseError {
            payload: frame.raw.clone(),
            reason: e.to_string(),
        })
}
