//! Document storage collaborators
//!
//! Documents are addressed by blob name (`{record_id}/raw/{file}` by
//! convention). The filesystem store serves a local folder; the HTTP store
//! reads from a blob container URL with an optional SAS query string.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("dqv-validator/", env!("CARGO_PKG_VERSION"));
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Document storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document reference: {0}")]
    InvalidReference(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage transport error: {0}")]
    Transport(String),

    #[error("Storage returned HTTP {status} for {blob_name}")]
    Http { status: u16, blob_name: String },
}

/// Read-only access to uploaded documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the raw document bytes
    async fn read(&self, blob_name: &str) -> Result<Bytes, StorageError>;

    /// Reachability probe for health reporting
    async fn ping(&self) -> bool;
}

/// Blob names must be relative paths without `..` or root components
fn validate_blob_name(blob_name: &str) -> Result<(), StorageError> {
    if blob_name.trim().is_empty() {
        return Err(StorageError::InvalidReference("empty blob name".to_string()));
    }
    if blob_name.contains('\\') {
        return Err(StorageError::InvalidReference(blob_name.to_string()));
    }
    let all_normal = Path::new(blob_name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal {
        return Err(StorageError::InvalidReference(blob_name.to_string()));
    }
    Ok(())
}

/// Documents stored under a local folder
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn read(&self, blob_name: &str) -> Result<Bytes, StorageError> {
        validate_blob_name(blob_name)?;
        let path = self.root.join(blob_name);
        debug!(path = %path.display(), "Reading document from filesystem");

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob_name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn ping(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

/// Documents in an HTTP blob container
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: Url,
    sas_token: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(
        base_url: &str,
        sas_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StorageError::InvalidReference(format!("base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidReference(format!(
                "base_url is not a hierarchical URL: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            sas_token: sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    /// URL of one blob, path segments percent-encoded
    pub fn blob_url(&self, blob_name: &str) -> Result<Url, StorageError> {
        validate_blob_name(blob_name)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidReference(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(blob_name.split('/'));
        url.set_query(self.sas_token.as_deref());
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn read(&self, blob_name: &str) -> Result<Bytes, StorageError> {
        let url = self.blob_url(blob_name)?;
        debug!(blob_name, "Downloading document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|e| StorageError::Transport(e.to_string())),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(blob_name.to_string())),
            status => Err(StorageError::Http {
                status: status.as_u16(),
                blob_name: blob_name.to_string(),
            }),
        }
    }

    async fn ping(&self) -> bool {
        self.client
            .get(self.base_url.clone())
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}
