//! Document source
//!
//! Fetches the binary document shown next to a conversation. The bytes are
//! passed through untouched.

use crate::config::{ChatConfig, Credentials};
use crate::error::TransportError;
use crate::runtime::http::{build_client, document_url, endpoint_url, send, with_credentials};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(document_id).await
    }
}

/// `GET <document_endpoint>/<document id>` with the session credentials
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl HttpDocumentSource {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: endpoint_url(&config.document_endpoint)?,
            credentials: config.credentials.clone(),
        })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, TransportError> {
        let url = document_url(&self.base_url, document_id);
        tracing::debug!(url = %url, "Fetching document");

        let response = send(with_credentials(self.client.get(url), &self.credentials)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read document: {e}")))?;

        tracing::info!(document_id, bytes = bytes.len(), "Document fetched");
        Ok(bytes.to_vec())
    }
}

/// Write `bytes` to `path` via a temporary sibling so readers never see a
/// partial file
pub async fn save_document(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".part");
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Document saved");
    Ok(())
}
