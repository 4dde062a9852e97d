//! Turn controller
//!
//! One task owns the [`Conversation`] and runs turns to completion. While a
//! turn streams, the same task keeps serving commands so that submissions are
//! refused and cancellation is observed between chunks.

use super::traits::{ByteStream, ChatRequest, Transport};
use super::Command;
use crate::error::{InvalidStateError, TransportError};
use crate::state_machine::{AssistantHandle, Conversation, ConversationView, Role};
use crate::stream::{route, FrameDecoder, RouteOutcome, DEFAULT_MAX_FRAME_BYTES};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

const NO_SENTINEL_NOTE: &str = "stream ended without [DONE] sentinel";
const CANCELLED_REASON: &str = "cancelled";
const CLOSED_REASON: &str = "conversation closed";

/// Per-turn stream limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    /// Longest wait for the response or for the next chunk
    pub idle_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// How a turn left the streaming loop
#[derive(Debug)]
enum TurnEnd {
    Completed { note: Option<String> },
    Failed(TransportError),
    Cancelled(&'static str),
}

/// Drives turns for one conversation
pub struct TurnController<T: Transport> {
    conversation: Conversation,
    transport: Arc<T>,
    settings: TurnSettings,
    command_rx: mpsc::Receiver<Command>,
    view_tx: watch::Sender<ConversationView>,
    shutdown: CancellationToken,
}

impl<T: Transport + 'static> TurnController<T> {
    pub(crate) fn new(
        conversation: Conversation,
        transport: T,
        settings: TurnSettings,
        command_rx: mpsc::Receiver<Command>,
        view_tx: watch::Sender<ConversationView>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            conversation,
            transport: Arc::new(transport),
            settings,
            command_rx,
            view_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(document_id = %self.conversation.document_id(), "Starting conversation runtime");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        tracing::info!(document_id = %self.conversation.document_id(), "Conversation runtime stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { text, reply } => match self.start_turn(&text) {
                Ok(handle) => {
                    let _ = reply.send(Ok(handle.turn_id()));
                    self.drive_turn(handle).await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Submission rejected");
                    let _ = reply.send(Err(e));
                }
            },
            Command::Cancel => {
                tracing::debug!("Cancel requested with no turn in flight");
            }
            Command::Acknowledge => match self.conversation.acknowledge() {
                Ok(()) => self.publish(),
                Err(e) => tracing::debug!(error = %e, "Acknowledge ignored"),
            },
        }
    }

    fn start_turn(&mut self, text: &str) -> Result<AssistantHandle, InvalidStateError> {
        self.conversation.append_user_message(text)?;
        let handle = self.conversation.begin_assistant_placeholder()?;
        self.publish();
        Ok(handle)
    }

    async fn drive_turn(&mut self, handle: AssistantHandle) {
        let turn_id = handle.turn_id();
        tracing::info!(
            document_id = %self.conversation.document_id(),
            turn_id = %turn_id,
            history = self.conversation.messages().len(),
            "Turn started"
        );

        let end = self.stream_turn(&handle).await;
        let closed = match end {
            TurnEnd::Completed { note } => {
                tracing::info!(turn_id = %turn_id, note = ?note, "Turn completed");
                self.conversation.finalize_turn(handle, note)
            }
            TurnEnd::Failed(err) => {
                tracing::error!(
                    turn_id = %turn_id,
                    kind = err.kind.as_str(),
                    error = %err,
                    "Turn failed"
                );
                self.conversation.fail_turn(handle, &err.message)
            }
            TurnEnd::Cancelled(reason) => {
                tracing::info!(turn_id = %turn_id, reason, "Turn cancelled");
                self.conversation.cancel_turn(handle, reason)
            }
        };
        if let Err(e) = closed {
            tracing::error!(turn_id = %turn_id, error = %e, "Failed to close turn");
        }
        self.publish();
    }

    /// Open the stream and apply frames until a terminal condition.
    ///
    /// The stream is owned by this call and dropped on every return path.
    async fn stream_turn(&mut self, handle: &AssistantHandle) -> TurnEnd {
        let request = ChatRequest {
            messages: self.conversation.messages().to_vec(),
        };
        debug_assert!(request
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty()));

        let transport = Arc::clone(&self.transport);
        let document_id = self.conversation.document_id().to_string();
        let idle = tokio::time::sleep(self.settings.idle_timeout);
        tokio::pin!(idle);

        let open = transport.open(&document_id, &request);
        tokio::pin!(open);
        let stream = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return TurnEnd::Cancelled(CLOSED_REASON),
                Some(command) = self.command_rx.recv() => {
                    if self.handle_command_in_flight(command) {
                        return TurnEnd::Cancelled(CANCELLED_REASON);
                    }
                }
                () = &mut idle => {
                    return TurnEnd::Failed(TransportError::idle_timeout(self.settings.idle_timeout));
                }
                opened = &mut open => match opened {
                    Ok(stream) => break stream,
                    Err(e) => return TurnEnd::Failed(e),
                },
            }
        };

        self.consume(handle, stream, idle).await
    }

    async fn consume(
        &mut self,
        handle: &AssistantHandle,
        mut stream: ByteStream,
        mut idle: std::pin::Pin<&mut Sleep>,
    ) -> TurnEnd {
        let idle_timeout = self.settings.idle_timeout;
        let mut decoder = FrameDecoder::new(self.settings.max_frame_bytes);
        idle.as_mut().reset(Instant::now() + idle_timeout);

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return TurnEnd::Cancelled(CLOSED_REASON),
                Some(command) = self.command_rx.recv() => {
                    if self.handle_command_in_flight(command) {
                        return TurnEnd::Cancelled(CANCELLED_REASON);
                    }
                }
                () = idle.as_mut() => return TurnEnd::Failed(TransportError::idle_timeout(idle_timeout)),
                chunk = stream.next() => match chunk {
                    None => {
                        decoder.finish();
                        tracing::warn!(turn_id = %handle.turn_id(), "{NO_SENTINEL_NOTE}");
                        return TurnEnd::Completed { note: Some(NO_SENTINEL_NOTE.to_string()) };
                    }
                    Some(Err(e)) => return TurnEnd::Failed(e),
                    Some(Ok(bytes)) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                        if let Some(end) = self.apply_chunk(handle, &mut decoder, &bytes) {
                            return end;
                        }
                    }
                },
            }
        }
    }

    /// Decode one chunk and route its frames in order
    fn apply_chunk(
        &mut self,
        handle: &AssistantHandle,
        decoder: &mut FrameDecoder,
        bytes: &[u8],
    ) -> Option<TurnEnd> {
        if bytes.is_empty() {
            return None;
        }
        if let Err(e) = self.conversation.mark_streaming(handle) {
            tracing::error!(turn_id = %handle.turn_id(), error = %e, "Turn state out of sync");
        }

        // Frames completed before a decode error are still applied
        let mut frames = Vec::new();
        let decoded = decoder.push(bytes, &mut frames);
        tracing::trace!(turn_id = %handle.turn_id(), bytes = bytes.len(), frames = frames.len(), "Chunk decoded");

        for frame in &frames {
            if route(&mut self.conversation, handle, frame) == RouteOutcome::Done {
                return Some(TurnEnd::Completed { note: None });
            }
        }
        if let Err(e) = decoded {
            return Some(TurnEnd::Failed(e));
        }
        self.publish();
        None
    }

    /// Serve a command that arrived mid-turn; returns true to cancel the turn
    fn handle_command_in_flight(&mut self, command: Command) -> bool {
        match command {
            Command::Submit { text, reply } => {
                let rejected = self.conversation.append_user_message(&text);
                debug_assert_eq!(rejected, Err(InvalidStateError::TurnInFlight));
                tracing::debug!("Rejecting submission while a turn is in flight");
                let _ = reply.send(rejected);
                false
            }
            Command::Cancel => true,
            Command::Acknowledge => {
                tracing::debug!("Acknowledge ignored while a turn is in flight");
                false
            }
        }
    }

    fn publish(&self) {
        self.view_tx
            .send_modify(|view| self.conversation.refresh_view(view));
    }
}
