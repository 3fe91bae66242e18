//! Core data types and error definitions for the ingestion pipeline.

use crate::{
    config::Config,
    dataset::DatasetEntry,
    extract::ExtractError,
    fetch::FetchError,
    metrics::{DocumentSample, MetricsSnapshot},
    store::{DocumentStatus, PersistError, RecordRef},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::{keywords::DEFAULT_KEYWORD_COUNT, summarize::DEFAULT_SUMMARY_SENTENCES};

/// Stages of a document pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Download bytes and write them to local storage.
    Fetch,
    /// Parse stored bytes into text.
    Extract,
    /// Create the metadata record.
    PersistInitial,
    /// Compute the extractive summary.
    Summarize,
    /// Compute ranked keywords.
    Keywords,
    /// Write summary and keywords to the record.
    PersistUpdate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::PersistInitial => "persist_initial",
            Self::Summarize => "summarize",
            Self::Keywords => "keywords",
            Self::PersistUpdate => "persist_update",
        };
        f.write_str(label)
    }
}

/// Document-scoped failures. None of them abort the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network transfer or local write failed.
    #[error("Failed to fetch document: {0}")]
    Fetch(#[from] FetchError),
    /// The stored fetch result was zero bytes long.
    #[error("Stored document {path} is empty")]
    EmptyInput {
        /// Local storage path.
        path: String,
    },
    /// The stored fetch result could not be read back.
    #[error("Stored document {path} is unreadable: {source}")]
    UnreadableInput {
        /// Local storage path.
        path: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The extractor produced no text.
    #[error("Failed to extract text: {0}")]
    Extract(#[from] ExtractError),
    /// The record store rejected a write.
    #[error("Failed to persist record: {0}")]
    Persist(#[from] PersistError),
    /// A CPU-bound stage panicked or was cancelled on the blocking pool.
    #[error("Pipeline task aborted: {0}")]
    Aborted(String),
}

/// A pipeline error tagged with where it happened.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: Stage,
    /// Last status the document reached before the failure.
    pub reached: DocumentStatus,
    /// Underlying error.
    #[source]
    pub error: PipelineError,
}

impl StageFailure {
    pub(crate) fn new(
        stage: Stage,
        reached: DocumentStatus,
        error: impl Into<PipelineError>,
    ) -> Self {
        Self {
            stage,
            reached,
            error: error.into(),
        }
    }
}

/// Result of a document pipeline that reached the stored status.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Handle of the persisted record.
    pub record: RecordRef,
    /// Summary written to the record.
    pub summary: String,
    /// Keywords written to the record.
    pub keywords: Vec<String>,
    /// Measurements added to the run metrics.
    pub sample: DocumentSample,
}

/// Tunables for the scoring stages.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Sentences kept per summary.
    pub summary_sentences: usize,
    /// Keywords kept per document.
    pub keyword_count: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            summary_sentences: DEFAULT_SUMMARY_SENTENCES,
            keyword_count: DEFAULT_KEYWORD_COUNT,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            summary_sentences: config.summary_sentences,
            keyword_count: config.keyword_count,
        }
    }
}

/// A document that did not reach the stored status, with enough context to retry by hand.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    /// Dataset name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// Failing stage; `None` when the pipeline panicked.
    pub stage: Option<Stage>,
    /// Last status reached before the failure; `None` when the pipeline panicked.
    pub reached: Option<DocumentStatus>,
    /// Rendered error.
    pub error: String,
}

impl FailedDocument {
    pub(crate) fn from_failure(entry: &DatasetEntry, failure: &StageFailure) -> Self {
        Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            stage: Some(failure.stage),
            reached: Some(failure.reached),
            error: failure.error.to_string(),
        }
    }

    pub(crate) fn from_panic(entry: &DatasetEntry, error: &tokio::task::JoinError) -> Self {
        Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            stage: None,
            reached: None,
            error: error.to_string(),
        }
    }
}

/// End-of-run totals.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Documents in the dataset.
    pub documents_total: usize,
    /// Documents that reached the stored status.
    pub documents_stored: usize,
    /// Documents that failed a stage.
    pub documents_failed: usize,
    /// Documents never started because the run was cancelled.
    pub documents_skipped: usize,
    /// Total fetch time over stored documents, in seconds.
    pub total_fetch_secs: f64,
    /// Total extraction time over stored documents, in seconds.
    pub total_extract_secs: f64,
    /// Mean memory sample per stored document, in MiB.
    pub average_memory_mib: Option<f64>,
    /// Failed documents.
    pub failures: Vec<FailedDocument>,
}

impl RunReport {
    pub(crate) fn new(
        documents_total: usize,
        documents_skipped: usize,
        metrics: MetricsSnapshot,
        mut failures: Vec<FailedDocument>,
    ) -> Self {
        failures.sort_by(|left, right| left.name.cmp(&right.name));
        Self {
            documents_total,
            documents_stored: metrics.documents as usize,
            documents_failed: failures.len(),
            documents_skipped,
            total_fetch_secs: metrics.total_fetch_time.as_secs_f64(),
            total_extract_secs: metrics.total_extract_time.as_secs_f64(),
            average_memory_mib: metrics.average_memory_mib(),
            failures,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} of {} documents ({} failed, {} skipped).",
            self.documents_stored, self.documents_total, self.documents_failed, self.documents_skipped
        )?;
        writeln!(f, "Total Fetch Time: {:.2} seconds", self.total_fetch_secs)?;
        writeln!(f, "Total Extraction Time: {:.2} seconds", self.total_extract_secs)?;
        match self.average_memory_mib {
            Some(average) => writeln!(f, "Average Memory Usage: {average:.2} MB")?,
            None => writeln!(f, "Average Memory Usage: n/a")?,
        }
        for failure in &self.failures {
            let stage = failure
                .stage
                .map_or_else(|| "unknown stage".to_string(), |stage| stage.to_string());
            writeln!(
                f,
                "  failed {} ({}) at {stage}: {}",
                failure.name, failure.url, failure.error
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn report_derives_counts_from_metrics() {
        let metrics = MetricsSnapshot {
            total_fetch_time: Duration::from_millis(1500),
            total_extract_time: Duration::from_millis(500),
            total_memory_bytes: 4 * 1024 * 1024,
            documents: 2,
        };
        let failure = FailedDocument {
            name: "doc3".into(),
            url: "http://x/c.pdf".into(),
            stage: Some(Stage::Fetch),
            reached: Some(DocumentStatus::Pending),
            error: "boom".into(),
        };
        let report = RunReport::new(4, 1, metrics, vec![failure]);

        assert_eq!(report.documents_stored, 2);
        assert_eq!(report.documents_failed, 1);
        assert_eq!(report.average_memory_mib, Some(2.0));
        let rendered = report.to_string();
        assert!(rendered.contains("Total Fetch Time: 1.50 seconds"));
        assert!(rendered.contains("failed doc3 (http://x/c.pdf) at fetch: boom"));
    }

    #[test]
    fn stage_serializes_snake_case() {
        let value = serde_json::to_value(Stage::PersistUpdate).expect("json");
        assert_eq!(value, serde_json::json!("persist_update"));
    }
}
