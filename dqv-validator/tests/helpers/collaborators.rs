//! In-memory document store and scripted text extractors

use async_trait::async_trait;
use bytes::Bytes;
use dqv_validator::collaborators::{DocumentStore, OcrError, StorageError, TextExtractor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Documents held in memory, keyed by blob name
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Bytes>>,
    reads: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, blob_name: &str, content: impl Into<Bytes>) -> Self {
        self.insert(blob_name, content);
        self
    }

    pub fn insert(&self, blob_name: &str, content: impl Into<Bytes>) {
        self.documents
            .write()
            .unwrap()
            .insert(blob_name.to_string(), content.into());
    }

    /// Number of `read` calls served (found or not)
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, blob_name: &str) -> Result<Bytes, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.documents
            .read()
            .unwrap()
            .get(blob_name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(blob_name.to_string()))
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Extractor that finds no text in anything
#[derive(Debug, Default)]
pub struct EmptyTextExtractor;

#[async_trait]
impl TextExtractor for EmptyTextExtractor {
    fn name(&self) -> &'static str {
        "empty"
    }

    async fn extract(&self, _document: Bytes) -> Result<String, OcrError> {
        Ok("  \n ".to_string())
    }
}

/// Extractor whose service always errors
#[derive(Debug, Default)]
pub struct FailingTextExtractor;

#[async_trait]
impl TextExtractor for FailingTextExtractor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extract(&self, _document: Bytes) -> Result<String, OcrError> {
        Err(OcrError::Api {
            status: 500,
            body: "internal error".to_string(),
        })
    }

    async fn ping(&self) -> bool {
        false
    }
}
