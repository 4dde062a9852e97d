//! Response stream decoding
//!
//! Bytes become [`StreamFrame`]s in [`frame`], frames become typed events in
//! [`payload`], and [`router`] applies them to a conversation.

pub mod frame;
pub mod payload;
pub mod router;

#[cfg(test)]
mod proptests;

pub use frame::{decode_stream, FrameDecoder, StreamFrame, DEFAULT_MAX_FRAME_BYTES, FRAME_PREFIX};
pub use payload::{classify, Disposition, EventPayload, DONE_SENTINEL};
pub use router::{route, RouteOutcome};
