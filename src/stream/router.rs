//! Applies decoded frames to conversation state

use super::frame::StreamFrame;
use super::payload::{classify, Disposition, EventPayload};
use crate::state_machine::{AssistantHandle, Conversation};

/// Whether the turn should keep reading frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Continue,
    /// Sentinel reached; later frames of this turn must not be applied
    Done,
}

/// Apply one frame in arrival order.
///
/// Malformed payloads are recorded against the turn and skipped; they never
/// end it.
pub fn route(conv: &mut Conversation, handle: &AssistantHandle, frame: &StreamFrame) -> RouteOutcome {
    match classify(frame) {
        Ok(Disposition::Done) => {
            tracing::debug!(turn_id = %handle.turn_id(), "Received end-of-stream sentinel");
            RouteOutcome::Done
        }
        Ok(Disposition::Event(EventPayload::Context { content })) => {
            tracing::debug!(turn_id = %handle.turn_id(), len = content.len(), "Context replaced");
            conv.set_context(content);
            RouteOutcome::Continue
        }
        Ok(Disposition::Event(EventPayload::Answer { content })) => {
            if let Err(e) = conv.append_to_assistant(handle, &content) {
                tracing::error!(turn_id = %handle.turn_id(), error = %e, "Dropped answer fragment");
            }
            RouteOutcome::Continue
        }
        Ok(Disposition::Event(EventPayload::Unknown)) => {
            tracing::debug!(turn_id = %handle.turn_id(), raw = %frame.raw, "Ignoring unknown event type");
            RouteOutcome::Continue
        }
        Err(e) => {
            tracing::warn!(turn_id = %handle.turn_id(), error = %e, "Skipping malformed frame");
            conv.record_parse_error(e);
            RouteOutcome::Continue
        }
    }
}
