//! Record entity, status lifecycle, and store errors.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Errors returned by record stores.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The store was closed before the write arrived.
    #[error("Record store is closed")]
    Closed,
    /// No record matches the storage path used as update key.
    #[error("No record stored for path {0}")]
    NotFound(String),
    /// Backing file could not be read or written.
    #[error("Record store IO failed: {0}")]
    Io(#[from] std::io::Error),
    /// Records could not be encoded or decoded.
    #[error("Record store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Store backend rejected the write for another reason.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Processing state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Task created, nothing fetched yet.
    Pending,
    /// Bytes written to local storage.
    Fetched,
    /// Text extracted.
    Extracted,
    /// Summary and keywords computed.
    Summarized,
    /// Final record persisted.
    Stored,
    /// A stage failed; no further stages ran.
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Extracted => "extracted",
            Self::Summarized => "summarized",
            Self::Stored => "stored",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Persisted metadata for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier assigned when the record is first created.
    pub record_id: Uuid,
    /// Document identifier derived from the source URL.
    pub document_name: String,
    /// Dataset key the document was listed under.
    pub dataset_name: String,
    /// Source URL.
    pub source_url: String,
    /// Local storage path; the update match key.
    pub storage_path: String,
    /// Size of the stored bytes.
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored bytes.
    pub content_hash: String,
    /// RFC 3339 UTC ingestion timestamp.
    pub ingested_at: String,
    /// Extractive summary, absent until computed.
    pub summary: Option<String>,
    /// Ranked keywords, absent until computed.
    pub keywords: Option<Vec<String>>,
    /// Processing status.
    pub status: DocumentStatus,
}

impl DocumentRecord {
    /// Build the initial record written before summarization.
    pub fn initial(
        document_name: impl Into<String>,
        dataset_name: impl Into<String>,
        source_url: impl Into<String>,
        storage_path: &Path,
        size_bytes: u64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            document_name: document_name.into(),
            dataset_name: dataset_name.into(),
            source_url: source_url.into(),
            storage_path: storage_path.to_string_lossy().into_owned(),
            size_bytes,
            content_hash: content_hash.into(),
            ingested_at: now_rfc3339(),
            summary: None,
            keywords: None,
            status: DocumentStatus::Extracted,
        }
    }

    /// Apply an update in place.
    pub fn apply(&mut self, update: &RecordUpdate) {
        self.summary = Some(update.summary.clone());
        self.keywords = Some(update.keywords.clone());
        self.status = update.status;
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Handle returned when a record is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    /// Record identifier.
    pub record_id: Uuid,
    /// Storage path the record is keyed by.
    pub storage_path: String,
}

/// Fields written by the final persist stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Computed summary.
    pub summary: String,
    /// Computed keywords in rank order.
    pub keywords: Vec<String>,
    /// Status after the update.
    pub status: DocumentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_record_has_no_results() {
        let record = DocumentRecord::initial(
            "a.pdf",
            "doc1",
            "http://x/a.pdf",
            Path::new("out/a.pdf"),
            42,
            "abc",
        );
        assert!(record.summary.is_none());
        assert!(record.keywords.is_none());
        assert_eq!(record.storage_path, "out/a.pdf");
        assert!(OffsetDateTime::parse(&record.ingested_at, &Rfc3339).is_ok());
    }

    #[test]
    fn status_serializes_lowercase() {
        let value = serde_json::to_value(DocumentStatus::Stored).expect("json");
        assert_eq!(value, serde_json::json!("stored"));
    }
}
