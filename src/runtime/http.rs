//! HTTP transport for the streaming chat endpoint

use super::traits::{ByteStream, ChatRequest, Transport};
use crate::config::{ChatConfig, Credentials};
use crate::error::TransportError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, RequestBuilder, Response, Url};

/// Streams chat responses over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: endpoint_url(&config.chat_endpoint)?,
            credentials: config.credentials.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        document_id: &str,
        request: &ChatRequest,
    ) -> Result<ByteStream, TransportError> {
        let url = document_url(&self.base_url, document_id);
        tracing::debug!(url = %url, messages = request.messages.len(), "Opening chat stream");

        let builder = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request);
        let response = send(with_credentials(builder, &self.credentials)).await?;

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::network(format!("Stream interrupted: {e}")))
        });
        Ok(stream.boxed())
    }
}

pub(crate) fn build_client(config: &ChatConfig) -> Result<Client, TransportError> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))
}

/// Parse an endpoint base that document ids are appended to
pub(crate) fn endpoint_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw)
        .map_err(|e| TransportError::protocol(format!("Invalid endpoint {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(TransportError::protocol(format!(
            "Invalid endpoint {raw}: not a hierarchical URL"
        )));
    }
    Ok(url)
}

/// `<base>/<document id>`, with the id escaped as a single path segment
pub(crate) fn document_url(base: &Url, document_id: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(document_id);
    }
    url
}

pub(crate) fn with_credentials(builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
    let builder = match &credentials.session_cookie {
        Some(cookie) => builder.header(COOKIE, cookie),
        None => builder,
    };
    match &credentials.bearer_token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// Send and classify the status line; the body is left unread on success
pub(crate) async fn send(builder: RequestBuilder) -> Result<Response, TransportError> {
    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            TransportError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            TransportError::network(format!("Connection failed: {e}"))
        } else {
            TransportError::network(format!("Request failed: {e}"))
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no detail").to_string()
    } else {
        body
    };
    Err(TransportError::from_status(status.as_u16(), detail.trim()))
}
