//! Pure turn state transition function
//!
//! `Idle -> AwaitingFirstByte -> Streaming -> {Completed, Failed} -> Idle`.
//! Every (state, event) pair has an answer: either a new state or a
//! [`TransitionError`].

use super::{TurnEvent, TurnState};
use thiserror::Error;

/// Errors that can occur during transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a turn is already in flight")]
    TurnInFlight,
    #[error("no turn is in flight")]
    NoActiveTurn,
    #[error("turn has not reached a terminal state")]
    NotTerminal,
}

/// Pure transition function
pub fn transition(state: TurnState, event: TurnEvent) -> Result<TurnState, TransitionError> {
    use TurnEvent as E;
    use TurnState as S;

    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================
        (S::Idle | S::Completed | S::Failed, E::Submit) => Ok(S::AwaitingFirstByte),
        (S::AwaitingFirstByte | S::Streaming, E::Submit) => Err(TransitionError::TurnInFlight),

        // ============================================================
        // Streaming
        // ============================================================
        (S::AwaitingFirstByte | S::Streaming, E::BytesReceived) => Ok(S::Streaming),

        // An empty body that closes cleanly still completes the turn
        (S::AwaitingFirstByte | S::Streaming, E::Finish) => Ok(S::Completed),

        // ============================================================
        // Failure and cancellation
        // ============================================================
        (S::AwaitingFirstByte | S::Streaming, E::Fail | E::Cancel) => Ok(S::Failed),

        // ============================================================
        // Acknowledgement
        // ============================================================
        (S::Idle | S::Completed | S::Failed, E::Acknowledge) => Ok(S::Idle),
        (S::AwaitingFirstByte | S::Streaming, E::Acknowledge) => {
            Err(TransitionError::NotTerminal)
        }

        // ============================================================
        // Stream events with no turn in flight
        // ============================================================
        (S::Idle | S::Completed | S::Failed, E::BytesReceived | E::Finish | E::Fail | E::Cancel) => {
            Err(TransitionError::NoActiveTurn)
        }
    }
}
