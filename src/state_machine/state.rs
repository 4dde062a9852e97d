//! Conversation state types

use crate::error::ParseError;
use serde::Serialize;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation log, serialized as-is into the request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lifecycle of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No turn yet, or the last terminal state was acknowledged
    #[default]
    Idle,
    /// Request sent, no response bytes yet
    AwaitingFirstByte,
    /// Response bytes are arriving
    Streaming,
    Completed,
    Failed,
}

impl TurnState {
    /// A turn is in flight; new submissions are refused
    pub fn is_busy(self) -> bool {
        matches!(self, TurnState::AwaitingFirstByte | TurnState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }

    /// Whether a new user submission may start a turn
    pub fn accepts_submission(self) -> bool {
        !self.is_busy()
    }
}

/// Things noticed during a turn that did not end it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnDiagnostics {
    /// Frames skipped because their payload was malformed
    pub parse_errors: Vec<ParseError>,
    /// Set when the turn finished in an unusual but non-fatal way
    pub note: Option<String>,
}

/// Read-only projection handed to the UI layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationView {
    pub messages: Vec<ConversationMessage>,
    pub is_busy: bool,
    pub context_text: String,
    pub turn_state: TurnState,
    pub diagnostics: TurnDiagnostics,
}

impl ConversationView {
    /// Content of the newest assistant message, if any
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}
