//! Events that drive turn state transitions

/// Events that trigger [`TurnState`](super::TurnState) transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// User text accepted, request about to be sent
    Submit,
    /// A non-empty chunk arrived from the transport
    BytesReceived,
    /// Sentinel seen, or the stream ended cleanly without one
    Finish,
    /// Transport or request-level failure
    Fail,
    /// Caller dropped interest in the in-flight turn
    Cancel,
    /// The UI observed the terminal state
    Acknowledge,
}
