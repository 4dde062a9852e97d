//! Conversation log and the in-progress assistant message
//!
//! The log is append-only. During a turn exactly one assistant message is
//! mutable, and only through the [`AssistantHandle`] returned when it was
//! created. Finishing or failing the turn consumes the handle, which freezes
//! the message.

use super::state::{ConversationMessage, ConversationView, TurnDiagnostics, TurnState};
use super::transition::{transition, TransitionError};
use super::TurnEvent;
use crate::error::{InvalidStateError, ParseError};
use uuid::Uuid;

/// Write access to the placeholder assistant message of one turn
#[derive(Debug, PartialEq, Eq)]
pub struct AssistantHandle {
    index: usize,
    turn_id: Uuid,
}

impl AssistantHandle {
    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }
}

#[derive(Debug)]
struct ActiveTurn {
    id: Uuid,
    placeholder: Option<usize>,
}

/// State of one conversation view, keyed by the document it is about
#[derive(Debug)]
pub struct Conversation {
    document_id: String,
    messages: Vec<ConversationMessage>,
    turn_state: TurnState,
    active: Option<ActiveTurn>,
    context_text: String,
    diagnostics: TurnDiagnostics,
}

impl From<TransitionError> for InvalidStateError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::TurnInFlight => InvalidStateError::TurnInFlight,
            TransitionError::NoActiveTurn => InvalidStateError::NoActiveTurn,
            TransitionError::NotTerminal => InvalidStateError::NotTerminal,
        }
    }
}

impl Conversation {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            messages: Vec::new(),
            turn_state: TurnState::Idle,
            active: None,
            context_text: String::new(),
            diagnostics: TurnDiagnostics::default(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn_state
    }

    pub fn is_busy(&self) -> bool {
        self.turn_state.is_busy()
    }

    pub fn context_text(&self) -> &str {
        &self.context_text
    }

    pub fn diagnostics(&self) -> &TurnDiagnostics {
        &self.diagnostics
    }

    /// Snapshot for observers
    pub fn view(&self) -> ConversationView {
        let mut view = ConversationView::default();
        self.refresh_view(&mut view);
        view
    }

    /// Bring a view previously built from this conversation up to date.
    ///
    /// Only the newest message can still change, so earlier entries of
    /// `view.messages` are kept and just the tail is recloned.
    pub fn refresh_view(&self, view: &mut ConversationView) {
        let keep = view.messages.len().saturating_sub(1).min(self.messages.len());
        view.messages.truncate(keep);
        view.messages.extend_from_slice(&self.messages[keep..]);
        if view.context_text != self.context_text {
            view.context_text.clone_from(&self.context_text);
        }
        if view.diagnostics != self.diagnostics {
            view.diagnostics.clone_from(&self.diagnostics);
        }
        view.is_busy = self.is_busy();
        view.turn_state = self.turn_state;
    }

    /// Start a turn with the user's text.
    ///
    /// Rejected without any change when a turn is in flight or the text is
    /// blank. Returns the new turn's id.
    pub fn append_user_message(&mut self, text: &str) -> Result<Uuid, InvalidStateError> {
        if self.is_busy() {
            return Err(InvalidStateError::TurnInFlight);
        }
        if text.trim().is_empty() {
            return Err(InvalidStateError::EmptyMessage);
        }
        self.turn_state = transition(self.turn_state, TurnEvent::Submit)?;

        let id = Uuid::new_v4();
        self.messages.push(ConversationMessage::user(text));
        self.active = Some(ActiveTurn {
            id,
            placeholder: None,
        });
        self.diagnostics = TurnDiagnostics::default();
        Ok(id)
    }

    /// Create the turn's single mutable assistant message
    pub fn begin_assistant_placeholder(&mut self) -> Result<AssistantHandle, InvalidStateError> {
        let active = self.active.as_mut().ok_or(InvalidStateError::NoActiveTurn)?;
        if active.placeholder.is_some() {
            return Err(InvalidStateError::PlaceholderExists);
        }
        let index = self.messages.len();
        self.messages.push(ConversationMessage::assistant(String::new()));
        active.placeholder = Some(index);
        Ok(AssistantHandle {
            index,
            turn_id: active.id,
        })
    }

    /// Record that response bytes are arriving
    pub fn mark_streaming(&mut self, handle: &AssistantHandle) -> Result<(), InvalidStateError> {
        self.check_handle(handle)?;
        self.turn_state = transition(self.turn_state, TurnEvent::BytesReceived)?;
        Ok(())
    }

    /// Append a fragment; empty fragments are a no-op
    pub fn append_to_assistant(
        &mut self,
        handle: &AssistantHandle,
        fragment: &str,
    ) -> Result<(), InvalidStateError> {
        let index = self.check_handle(handle)?;
        if !fragment.is_empty() {
            self.messages[index].content.push_str(fragment);
        }
        Ok(())
    }

    /// Replace the retrieved-context side channel
    pub fn set_context(&mut self, text: impl Into<String>) {
        self.context_text = text.into();
    }

    /// Remember a skipped frame against the current turn
    pub fn record_parse_error(&mut self, err: ParseError) {
        self.diagnostics.parse_errors.push(err);
    }

    /// Freeze the answer and mark the turn `Completed`
    pub fn finalize_turn(
        &mut self,
        handle: AssistantHandle,
        note: Option<String>,
    ) -> Result<(), InvalidStateError> {
        self.check_handle(&handle)?;
        self.turn_state = transition(self.turn_state, TurnEvent::Finish)?;
        self.active = None;
        self.diagnostics.note = note;
        Ok(())
    }

    /// Freeze the partial answer with a failure annotation and mark the turn
    /// `Failed`
    pub fn fail_turn(
        &mut self,
        handle: AssistantHandle,
        reason: &str,
    ) -> Result<(), InvalidStateError> {
        self.end_with_annotation(handle, TurnEvent::Fail, reason)
    }

    /// Like [`fail_turn`](Self::fail_turn), for a turn the caller abandoned
    pub fn cancel_turn(
        &mut self,
        handle: AssistantHandle,
        reason: &str,
    ) -> Result<(), InvalidStateError> {
        self.end_with_annotation(handle, TurnEvent::Cancel, reason)
    }

    /// Observe a terminal state, returning to `Idle`
    pub fn acknowledge(&mut self) -> Result<(), InvalidStateError> {
        self.turn_state = transition(self.turn_state, TurnEvent::Acknowledge)?;
        Ok(())
    }

    fn end_with_annotation(
        &mut self,
        handle: AssistantHandle,
        event: TurnEvent,
        reason: &str,
    ) -> Result<(), InvalidStateError> {
        let index = self.check_handle(&handle)?;
        self.turn_state = transition(self.turn_state, event)?;
        annotate_failure(&mut self.messages[index].content, reason);
        self.active = None;
        Ok(())
    }

    fn check_handle(&self, handle: &AssistantHandle) -> Result<usize, InvalidStateError> {
        match &self.active {
            Some(ActiveTurn {
                id,
                placeholder: Some(index),
            }) if *id == handle.turn_id && *index == handle.index => Ok(*index),
            _ => Err(InvalidStateError::StaleHandle),
        }
    }
}

fn annotate_failure(content: &mut String, reason: &str) {
    if content.is_empty() {
        *content = format!("An error occurred: {reason}");
    } else {
        content.push_str("\nError reading stream: ");
        content.push_str(reason);
    }
}
