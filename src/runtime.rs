//! Runtime for document conversations
//!
//! [`spawn_conversation`] starts a [`TurnController`] task and returns a
//! [`ChatHandle`] that submits input and observes the conversation.

mod executor;
pub mod http;
pub mod traits;


pub use executor::{TurnController, TurnSettings};
pub use http::HttpTransport;
pub use traits::*;

use crate::error::InvalidStateError;
use crate::state_machine::{Conversation, ConversationView};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;

/// Requests from a [`ChatHandle`] to the controller task
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<Uuid, InvalidStateError>>,
    },
    Cancel,
    Acknowledge,
}

/// Errors returned by [`ChatHandle`] methods
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error(transparent)]
    Rejected(#[from] InvalidStateError),
    #[error("conversation runtime has stopped")]
    Closed,
}

/// Handle to a running conversation
///
/// Clones share the same conversation. When the last clone is dropped the
/// runtime cancels any in-flight turn and stops.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    command_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<ConversationView>,
    shutdown: CancellationToken,
    _guard: Arc<DropGuard>,
}

impl ChatHandle {
    /// Start a turn with `text`
    ///
    /// Resolves once the controller has accepted or rejected the input; the
    /// answer itself arrives through [`subscribe`](Self::subscribe).
    pub async fn submit(&self, text: impl Into<String>) -> Result<Uuid, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HandleError::Closed)?.map_err(HandleError::from)
    }

    /// Cancel the in-flight turn, if any
    pub async fn cancel(&self) -> Result<(), HandleError> {
        self.send(Command::Cancel).await
    }

    /// Return a finished turn to `Idle`
    pub async fn acknowledge(&self) -> Result<(), HandleError> {
        self.send(Command::Acknowledge).await
    }

    /// Latest published view
    pub fn view(&self) -> ConversationView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view_rx.clone()
    }

    /// Stop the runtime, failing any in-flight turn
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), HandleError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| HandleError::Closed)
    }
}

/// Spawn the controller for one document conversation
pub fn spawn_conversation<T>(
    document_id: impl Into<String>,
    transport: T,
    settings: TurnSettings,
) -> (ChatHandle, JoinHandle<()>)
where
    T: Transport + 'static,
{
    let conversation = Conversation::new(document_id);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (view_tx, view_rx) = watch::channel(conversation.view());
    let shutdown = CancellationToken::new();

    let controller = TurnController::new(
        conversation,
        transport,
        settings,
        command_rx,
        view_tx,
        shutdown.clone(),
    );
    let task = tokio::spawn(controller.run());

    let handle = ChatHandle {
        command_tx,
        view_rx,
        _guard: Arc::new(shutdown.clone().drop_guard()),
        shutdown,
    };
    (handle, task)
}
