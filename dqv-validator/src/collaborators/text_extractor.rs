//! Text extraction collaborators
//!
//! The local extractor handles documents that already carry text: PDFs with a
//! text layer and plain UTF-8 files. Scanned images need the Document
//! Intelligence adapter.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// OCR / text extraction errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Unsupported document type: {0}")]
    Unsupported(String),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("OCR transport error: {0}")]
    Transport(String),

    #[error("OCR API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid OCR configuration: {0}")]
    InvalidConfig(String),
}

/// Turns document bytes into flattened text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, document: Bytes) -> Result<String, OcrError>;

    async fn ping(&self) -> bool {
        true
    }
}

/// In-process extraction: PDF text layer or UTF-8 passthrough
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTextExtractor;

impl LocalTextExtractor {
    async fn extract_pdf(document: Bytes) -> Result<String, OcrError> {
        let result = tokio::task::spawn_blocking(move || {
            // pdf_extract can panic on malformed PDFs
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem(&document)
            }))
        })
        .await
        .map_err(|e| OcrError::Failed(format!("PDF extraction task failed: {}", e)))?;

        match result {
            Ok(Ok(text)) => {
                debug!(chars = text.len(), "Extracted PDF text layer");
                Ok(text)
            }
            Ok(Err(e)) => Err(OcrError::Failed(format!("PDF extraction failed: {}", e))),
            Err(_) => Err(OcrError::Failed(
                "PDF extraction panicked (malformed PDF)".to_string(),
            )),
        }
    }
}

#[async_trait]
impl TextExtractor for LocalTextExtractor {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn extract(&self, document: Bytes) -> Result<String, OcrError> {
        match infer::get(&document).map(|kind| kind.mime_type()) {
            Some("application/pdf") => Self::extract_pdf(document).await,
            Some(mime) if mime.starts_with("text/") || mime.ends_with("xml") => {
                decode_utf8(document)
            }
            Some(mime) if mime.starts_with("image/") => Err(OcrError::Unsupported(format!(
                "{} needs an OCR service (ocr.kind = \"document-intelligence\")",
                mime
            ))),
            Some(mime) => Err(OcrError::Unsupported(mime.to_string())),
            None => decode_utf8(document),
        }
    }
}

fn decode_utf8(document: Bytes) -> Result<String, OcrError> {
    String::from_utf8(document.to_vec())
        .map(|text| text.trim_start_matches('\u{feff}').to_string())
        .map_err(|_| OcrError::Unsupported("binary document of unknown type".to_string()))
}
