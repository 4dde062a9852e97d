//! Trait abstractions for runtime I/O
//!
//! These traits let the turn controller run against mock transports in tests.

use crate::error::TransportError;
use crate::state_machine::ConversationMessage;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;

/// Response body as a stream of raw chunks
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Body of the chat request: the whole conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
}

/// Opens the response stream for one turn
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` for `document_id` and return the response body once
    /// the status line has been accepted
    async fn open(
        &self,
        document_id: &str,
        request: &ChatRequest,
    ) -> Result<ByteStream, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(
        &self,
        document_id: &str,
        request: &ChatRequest,
    ) -> Result<ByteStream, TransportError> {
        (**self).open(document_id, request).await
    }
}
