//! Collaborator seams: where PDFs come from and how they become text.

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::FileRef;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// A folder of PDFs, bound at construction.
#[async_trait]
pub trait PdfSource: Send + Sync {
    /// Every PDF under the folder, recursively. Order is source-defined.
    async fn list_pdfs(&self) -> Result<Vec<FileRef>, SourceError>;

    /// Raw bytes of one file.
    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, SourceError>;
}

/// Turns a PDF into plain text.
///
/// Implementations that create intermediate artifacts must remove them
/// before returning, whether or not extraction succeeded.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, file: &FileRef, pdf: &[u8]) -> Result<String, SourceError>;
}
