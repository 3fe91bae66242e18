use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docdigest::{
    dataset::Dataset,
    extract::SniffingExtractor,
    fetch::{FetchError, Fetcher, HttpFetcher, RetryPolicy},
    metrics::MemoryProbe,
    processing::{IngestionService, PipelineOptions, Stage, StageRunner, cancellation},
    store::{
        DocumentRecord, DocumentStatus, InMemoryRecordStore, PersistError, RecordRef,
        RecordStore, RecordUpdate,
    },
};
use httpmock::{Method::GET, MockServer};

const SCENARIO_TEXT: &str = "Cats are nice. Dogs are nice too. Birds fly high.";

struct FixedMemory(u64);

impl MemoryProbe for FixedMemory {
    fn sample_bytes(&self) -> u64 {
        self.0
    }
}

/// Store that rejects the final update for paths containing `reject`.
struct RejectingStore {
    inner: InMemoryRecordStore,
}

#[async_trait]
impl RecordStore for RejectingStore {
    async fn create_record(&self, record: DocumentRecord) -> Result<RecordRef, PersistError> {
        self.inner.create_record(record).await
    }

    async fn update_record(
        &self,
        storage_path: &str,
        update: RecordUpdate,
    ) -> Result<(), PersistError> {
        if storage_path.contains("reject") {
            return Err(PersistError::Unavailable("store offline".into()));
        }
        self.inner.update_record(storage_path, update).await
    }

    async fn mark_failed(&self, storage_path: &str) -> Result<(), PersistError> {
        self.inner.mark_failed(storage_path).await
    }

    async fn find_by_path(
        &self,
        storage_path: &str,
    ) -> Result<Option<DocumentRecord>, PersistError> {
        self.inner.find_by_path(storage_path).await
    }

    async fn records(&self) -> Result<Vec<DocumentRecord>, PersistError> {
        self.inner.records().await
    }

    async fn close(&self) -> Result<(), PersistError> {
        self.inner.close().await
    }
}

fn http_fetcher() -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(Duration::from_secs(5), RetryPolicy::default()).expect("fetcher"))
}

#[tokio::test]
async fn single_document_scenario() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/a.pdf");
            then.status(200).body(SCENARIO_TEXT);
        })
        .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecordStore::new());
    let runner = StageRunner::new(
        http_fetcher(),
        Arc::new(SniffingExtractor),
        store.clone(),
        PipelineOptions {
            summary_sentences: 3,
            keyword_count: 3,
        },
    )
    .with_memory_probe(Arc::new(FixedMemory(1024 * 1024)));
    let service = IngestionService::new(runner, 2);
    let dataset: Dataset = [("doc1".to_string(), server.url("/a.pdf"))]
        .into_iter()
        .collect();

    let report = service.run(&dataset, dir.path()).await;

    assert_eq!(report.documents_stored, 1);
    assert_eq!(report.documents_failed, 0);
    assert_eq!(report.average_memory_mib, Some(1.0));

    let records = store.records().await.expect("records");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.document_name, "a.pdf");
    assert_eq!(record.status, DocumentStatus::Stored);

    let keywords = record.keywords.clone().expect("keywords");
    assert_eq!(keywords, vec!["nice", "cats", "dogs"]);
    let distinct: HashSet<&String> = keywords.iter().collect();
    assert_eq!(distinct.len(), 3);

    assert_eq!(
        record.summary.as_deref(),
        Some("Dogs are nice too. Cats are nice. Birds fly high.")
    );
    assert!(dir.path().join("a.pdf").exists());
}

#[tokio::test]
async fn failures_are_isolated_and_excluded_from_totals() {
    let server = MockServer::start_async().await;
    for name in ["ok1", "ok2", "ok3", "reject"] {
        let path = format!("/{name}.txt");
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200).body(SCENARIO_TEXT);
            })
            .await;
    }
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing.txt");
            then.status(404);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blank.txt");
            then.status(200).body("   \n ");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/empty.txt");
            then.status(200).body("");
        })
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(RejectingStore {
        inner: InMemoryRecordStore::new(),
    });
    let runner = StageRunner::new(
        http_fetcher(),
        Arc::new(SniffingExtractor),
        store.clone(),
        PipelineOptions::default(),
    )
    .with_memory_probe(Arc::new(FixedMemory(100)));
    let service = IngestionService::new(runner, 3);
    let dataset: Dataset = ["ok1", "ok2", "ok3", "reject", "missing", "blank", "empty"]
        .into_iter()
        .map(|name| (name.to_string(), server.url(format!("/{name}.txt"))))
        .collect();

    let report = service.run(&dataset, dir.path()).await;

    assert_eq!(report.documents_total, 7);
    assert_eq!(report.documents_stored, 3);
    assert_eq!(report.documents_failed, 4);
    assert_eq!(report.documents_skipped, 0);
    assert_eq!(report.average_memory_mib, Some(100.0 / (1024.0 * 1024.0)));

    let stages: Vec<(String, Option<Stage>)> = report
        .failures
        .iter()
        .map(|failure| (failure.name.clone(), failure.stage))
        .collect();
    assert_eq!(
        stages,
        vec![
            ("blank".to_string(), Some(Stage::Extract)),
            ("empty".to_string(), Some(Stage::Extract)),
            ("missing".to_string(), Some(Stage::Fetch)),
            ("reject".to_string(), Some(Stage::PersistUpdate)),
        ]
    );
    let reached: Vec<Option<DocumentStatus>> =
        report.failures.iter().map(|failure| failure.reached).collect();
    assert_eq!(
        reached,
        vec![
            Some(DocumentStatus::Fetched),
            Some(DocumentStatus::Fetched),
            Some(DocumentStatus::Pending),
            Some(DocumentStatus::Summarized),
        ]
    );

    let records = store.records().await.expect("records");
    let stored = records
        .iter()
        .filter(|record| record.status == DocumentStatus::Stored)
        .count();
    assert_eq!(stored, dataset.len() - report.documents_failed);

    // The rejected document keeps its initial record, marked failed and without results.
    let rejected = records
        .iter()
        .find(|record| record.dataset_name == "reject")
        .expect("initial record");
    assert_eq!(rejected.status, DocumentStatus::Failed);
    assert!(rejected.summary.is_none());
    assert!(rejected.keywords.is_none());
}

/// Fetcher that tracks peak concurrency and answers after a short delay.
struct SlowFetcher {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("Document {url} talks about pipelines. Pipelines move data.").into_bytes())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_and_metrics_sum_per_document() {
    let fetcher = Arc::new(SlowFetcher {
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecordStore::new());
    let runner = StageRunner::new(
        fetcher.clone(),
        Arc::new(SniffingExtractor),
        store.clone(),
        PipelineOptions::default(),
    )
    .with_memory_probe(Arc::new(FixedMemory(4096)));
    let service = IngestionService::new(runner, 3);
    let dataset: Dataset = (0..24)
        .map(|i| (format!("doc{i:02}"), format!("mem://docs/{i}.txt")))
        .collect();

    let report = service.run(&dataset, dir.path()).await;

    assert_eq!(report.documents_stored, 24);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(
        report.average_memory_mib,
        Some(4096.0 / (1024.0 * 1024.0))
    );
    // Every fetch sleeps at least 10ms, so the summed fetch time covers all of them.
    assert!(report.total_fetch_secs >= 24.0 * 0.010);
    assert_eq!(store.records().await.expect("records").len(), 24);
}

#[tokio::test]
async fn cancelled_run_skips_unstarted_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecordStore::new());
    let runner = StageRunner::new(
        Arc::new(SlowFetcher {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }),
        Arc::new(SniffingExtractor),
        store.clone(),
        PipelineOptions::default(),
    );
    let service = IngestionService::new(runner, 1);
    let dataset: Dataset = (0..5)
        .map(|i| (format!("doc{i}"), format!("mem://docs/{i}.txt")))
        .collect();

    let (handle, signal) = cancellation();
    handle.cancel();
    let report = service.run_with_cancel(&dataset, dir.path(), signal).await;

    assert_eq!(report.documents_skipped, 5);
    assert_eq!(report.documents_stored, 0);
    assert!(store.records().await.expect("records").is_empty());
}
