//! Extractor collaborator: turn stored document bytes into plain text.
//!
//! PDFs are read page by page with `lopdf`; a page whose text cannot be decoded contributes
//! nothing instead of failing the document. Anything that is not a PDF is treated as UTF-8
//! text.

use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while extracting text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The document container could not be parsed at all.
    #[error("Failed to parse document: {0}")]
    Parse(String),
    /// Parsing succeeded but yielded no text.
    #[error("Document yielded no text")]
    NoText,
}

/// Interface implemented by document parsers.
///
/// Extraction is CPU-bound; callers run it on the blocking pool.
pub trait TextExtractor: Send + Sync {
    /// Concatenate the text of every page in `bytes`.
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Per-page PDF text extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|error| ExtractError::Parse(error.to_string()))?;

        let mut text = String::new();
        for page_number in document.get_pages().into_keys() {
            match document.extract_text(&[page_number]) {
                Ok(page_text) => text.push_str(&page_text),
                Err(error) => {
                    tracing::debug!(page = page_number, error = %error, "Skipping unreadable page");
                }
            }
        }
        non_empty(text)
    }
}

/// UTF-8 text documents; invalid sequences are replaced rather than rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        non_empty(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Dispatches on the leading magic bytes: PDFs to [`PdfExtractor`], everything else to
/// [`PlainTextExtractor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffingExtractor;

impl TextExtractor for SniffingExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        if bytes.starts_with(PDF_MAGIC) {
            PdfExtractor.extract(bytes)
        } else {
            PlainTextExtractor.extract(bytes)
        }
    }
}

fn non_empty(text: String) -> Result<String, ExtractError> {
    if text.trim().is_empty() {
        Err(ExtractError::NoText)
    } else {
        Ok(text)
    }
}
