//! Conversation state machine
//!
//! Pure turn transitions plus the owned conversation log they guard.

pub mod conversation;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use conversation::{AssistantHandle, Conversation};
pub use event::TurnEvent;
pub use state::{ConversationMessage, ConversationView, Role, TurnDiagnostics, TurnState};
pub use transition::{transition, TransitionError};
