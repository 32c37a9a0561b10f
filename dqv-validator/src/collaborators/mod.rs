//! External collaborators: document storage and text extraction

pub mod document_intelligence;
pub mod document_store;
pub mod text_extractor;

use dqv_common::config::{OcrConfig, OcrKind, StorageConfig, StorageKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use document_intelligence::DocumentIntelligenceExtractor;
pub use document_store::{DocumentStore, FsDocumentStore, HttpDocumentStore, StorageError};
pub use text_extractor::{LocalTextExtractor, OcrError, TextExtractor};

/// Build the configured document store
///
/// The filesystem store defaults to `<root_folder>/documents`.
pub fn document_store_from_config(
    config: &StorageConfig,
    root_folder: &Path,
    request_timeout: Duration,
) -> Result<Arc<dyn DocumentStore>, StorageError> {
    match config.kind {
        StorageKind::Fs => {
            let dir = config
                .documents_dir
                .clone()
                .unwrap_or_else(|| root_folder.join("documents"));
            Ok(Arc::new(FsDocumentStore::new(dir)))
        }
        StorageKind::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                StorageError::InvalidReference("storage.base_url is required".to_string())
            })?;
            let store = HttpDocumentStore::new(base_url, config.sas_token.clone(), request_timeout)?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the configured text extractor
pub fn text_extractor_from_config(
    config: &OcrConfig,
    api_key: Option<String>,
    request_timeout: Duration,
) -> Result<Arc<dyn TextExtractor>, OcrError> {
    match config.kind {
        OcrKind::Local => Ok(Arc::new(LocalTextExtractor)),
        OcrKind::DocumentIntelligence => Ok(Arc::new(DocumentIntelligenceExtractor::new(
            config,
            api_key,
            request_timeout,
        )?)),
    }
}
