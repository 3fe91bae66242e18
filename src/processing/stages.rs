//! Stage runner executing one document's fetch → extract → summarize → keywords → persist
//! sequence.

use crate::{
    dataset::DatasetEntry,
    extract::TextExtractor,
    fetch::Fetcher,
    metrics::{DocumentSample, MemoryProbe, MetricsAccumulator, SystemMemoryProbe},
    store::{DocumentRecord, DocumentStatus, RecordStore, RecordUpdate},
};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{
    keywords::KeywordExtractor,
    summarize::Summarizer,
    types::{PipelineError, PipelineOptions, Stage, StageFailure, StoredDocument},
};

/// Runs the per-document pipeline against shared collaborators.
///
/// A failing stage ends only that document's pipeline: the runner returns a
/// [`StageFailure`] and leaves the run metrics untouched. Once the initial record exists, a
/// later failure also marks that record failed. Metrics are recorded once, after the final
/// record update succeeds.
pub struct StageRunner {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn TextExtractor>,
    store: Arc<dyn RecordStore>,
    memory: Arc<dyn MemoryProbe>,
    summarizer: Summarizer,
    keywords: KeywordExtractor,
}

impl StageRunner {
    /// Build a runner sampling memory with [`SystemMemoryProbe`].
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn RecordStore>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            memory: Arc::new(SystemMemoryProbe),
            summarizer: Summarizer::new(options.summary_sentences),
            keywords: KeywordExtractor::new(options.keyword_count),
        }
    }

    /// Replace the memory probe.
    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    /// Execute every stage for `entry`, storing its bytes at `storage_path`.
    pub async fn run(
        &self,
        entry: &DatasetEntry,
        storage_path: &Path,
        metrics: &MetricsAccumulator,
    ) -> Result<StoredDocument, StageFailure> {
        let path_label = storage_path.to_string_lossy().into_owned();

        let fetch_started = Instant::now();
        let size = self
            .fetch_to_storage(&entry.url, storage_path)
            .await
            .map_err(|error| StageFailure::new(Stage::Fetch, DocumentStatus::Pending, error))?;
        let fetch_time = fetch_started.elapsed();
        tracing::info!(
            document = %entry.name,
            url = %entry.url,
            bytes = size,
            elapsed_ms = millis(fetch_time),
            "Fetched document"
        );

        let extract_started = Instant::now();
        let (text, content_hash, size_bytes) = self
            .extract_from_storage(storage_path, &path_label)
            .await
            .map_err(|error| StageFailure::new(Stage::Extract, DocumentStatus::Fetched, error))?;
        let extract_time = extract_started.elapsed();
        tracing::info!(
            document = %entry.name,
            chars = text.chars().count(),
            elapsed_ms = millis(extract_time),
            "Extracted text"
        );

        let record = DocumentRecord::initial(
            entry.identifier(),
            entry.name.clone(),
            entry.url.clone(),
            storage_path,
            size_bytes,
            content_hash,
        );
        let reference = self.store.create_record(record).await.map_err(|error| {
            StageFailure::new(Stage::PersistInitial, DocumentStatus::Extracted, error)
        })?;
        tracing::debug!(
            document = %entry.name,
            record_id = %reference.record_id,
            "Created initial record"
        );

        let (summary, keywords) = match self
            .score_and_update(entry, &reference.storage_path, text)
            .await
        {
            Ok(scored) => scored,
            Err(failure) => {
                self.mark_record_failed(entry, &reference.storage_path).await;
                return Err(failure);
            }
        };

        let sample = DocumentSample {
            fetch: fetch_time,
            extract: extract_time,
            memory_bytes: self.memory.sample_bytes(),
        };
        metrics.record_document(sample);
        tracing::info!(
            document = %entry.name,
            record_id = %reference.record_id,
            "Stored document"
        );

        Ok(StoredDocument {
            record: reference,
            summary,
            keywords,
            sample,
        })
    }

    async fn score_and_update(
        &self,
        entry: &DatasetEntry,
        storage_path: &str,
        text: String,
    ) -> Result<(String, Vec<String>), StageFailure> {
        let text: Arc<str> = Arc::from(text);

        let summarizer = self.summarizer;
        let summary = {
            let text = Arc::clone(&text);
            tokio::task::spawn_blocking(move || summarizer.summarize(&text))
                .await
                .map_err(|error| {
                    StageFailure::new(
                        Stage::Summarize,
                        DocumentStatus::Extracted,
                        PipelineError::Aborted(error.to_string()),
                    )
                })?
        };

        let extractor = self.keywords;
        let keywords = tokio::task::spawn_blocking(move || extractor.extract(&text))
            .await
            .map_err(|error| {
                StageFailure::new(
                    Stage::Keywords,
                    DocumentStatus::Extracted,
                    PipelineError::Aborted(error.to_string()),
                )
            })?;
        tracing::debug!(
            document = %entry.name,
            summary_chars = summary.len(),
            keywords = ?keywords,
            "Scored document"
        );

        self.store
            .update_record(
                storage_path,
                RecordUpdate {
                    summary: summary.clone(),
                    keywords: keywords.clone(),
                    status: DocumentStatus::Stored,
                },
            )
            .await
            .map_err(|error| {
                StageFailure::new(Stage::PersistUpdate, DocumentStatus::Summarized, error)
            })?;
        Ok((summary, keywords))
    }

    async fn mark_record_failed(&self, entry: &DatasetEntry, storage_path: &str) {
        if let Err(error) = self.store.mark_failed(storage_path).await {
            tracing::warn!(
                document = %entry.name,
                storage_path = %storage_path,
                error = %error,
                "Could not mark record failed"
            );
        }
    }

    async fn fetch_to_storage(&self, url: &str, storage_path: &Path) -> Result<usize, PipelineError> {
        let bytes = self.fetcher.fetch(url).await?;
        if let Some(parent) = storage_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(crate::fetch::FetchError::from)?;
        }
        tokio::fs::write(storage_path, &bytes)
            .await
            .map_err(crate::fetch::FetchError::from)?;
        Ok(bytes.len())
    }

    async fn extract_from_storage(
        &self,
        storage_path: &Path,
        path_label: &str,
    ) -> Result<(String, String, u64), PipelineError> {
        let bytes = tokio::fs::read(storage_path)
            .await
            .map_err(|source| PipelineError::UnreadableInput {
                path: path_label.to_string(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(PipelineError::EmptyInput {
                path: path_label.to_string(),
            });
        }

        let size_bytes = bytes.len() as u64;
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|error| PipelineError::Aborted(error.to_string()))??;
        Ok((text, content_hash, size_bytes))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
