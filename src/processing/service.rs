//! Ingestion orchestrator fanning a dataset out across a bounded worker pool.

use crate::{dataset::Dataset, metrics::MetricsAccumulator};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

use super::{
    stages::StageRunner,
    types::{FailedDocument, RunReport},
};

/// Sender half of a run cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Stop starting new documents. In-flight documents finish normally.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver half of a run cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self(receiver)
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested; pending forever if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut receiver = self.0.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked cancellation handle and signal.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle(sender), CancelSignal(receiver))
}

enum TaskOutcome {
    Stored,
    Failed(FailedDocument),
    Skipped,
}

/// Runs every document of a dataset through the [`StageRunner`].
///
/// One task is queued per document up front; a semaphore bounds how many run at once. Each
/// run gets a fresh [`MetricsAccumulator`] that is read once, after every task has finished.
pub struct IngestionService {
    runner: Arc<StageRunner>,
    workers: usize,
}

impl IngestionService {
    /// Build an orchestrator running at most `workers` pipelines concurrently.
    pub fn new(runner: StageRunner, workers: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            workers: workers.max(1),
        }
    }

    /// Configured concurrency bound.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process the whole dataset, storing fetched bytes under `output_dir`.
    pub async fn run(&self, dataset: &Dataset, output_dir: &Path) -> RunReport {
        self.run_with_cancel(dataset, output_dir, CancelSignal::never())
            .await
    }

    /// Process the dataset until done or until `cancel` fires.
    ///
    /// Documents not yet started when the signal fires are reported as skipped.
    pub async fn run_with_cancel(
        &self,
        dataset: &Dataset,
        output_dir: &Path,
        cancel: CancelSignal,
    ) -> RunReport {
        tracing::info!(
            documents = dataset.len(),
            workers = self.workers,
            output_dir = %output_dir.display(),
            "Starting ingestion run"
        );
        let metrics = Arc::new(MetricsAccumulator::new());
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (entry, storage_path) in dataset.plan_storage(output_dir) {
            let runner = Arc::clone(&self.runner);
            let metrics = Arc::clone(&metrics);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    tracing::info!(document = %entry.name, "Run cancelled; document skipped");
                    return TaskOutcome::Skipped;
                };

                let pipeline = {
                    let entry = entry.clone();
                    tokio::spawn(async move { runner.run(&entry, &storage_path, &metrics).await })
                };
                match pipeline.await {
                    Ok(Ok(_)) => TaskOutcome::Stored,
                    Ok(Err(failure)) => {
                        tracing::warn!(
                            document = %entry.name,
                            url = %entry.url,
                            stage = %failure.stage,
                            reached = %failure.reached,
                            error = %failure.error,
                            "Document pipeline failed"
                        );
                        TaskOutcome::Failed(FailedDocument::from_failure(&entry, &failure))
                    }
                    Err(error) => {
                        tracing::error!(
                            document = %entry.name,
                            url = %entry.url,
                            error = %error,
                            "Document pipeline panicked"
                        );
                        TaskOutcome::Failed(FailedDocument::from_panic(&entry, &error))
                    }
                }
            });
        }

        let mut failures = Vec::new();
        let mut skipped = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Stored) => {}
                Ok(TaskOutcome::Failed(failure)) => failures.push(failure),
                Ok(TaskOutcome::Skipped) => skipped += 1,
                Err(error) => tracing::error!(error = %error, "Document task aborted"),
            }
        }

        let report = RunReport::new(dataset.len(), skipped, metrics.snapshot(), failures);
        tracing::info!(
            stored = report.documents_stored,
            failed = report.documents_failed,
            skipped = report.documents_skipped,
            total_fetch_secs = report.total_fetch_secs,
            total_extract_secs = report.total_extract_secs,
            average_memory_mib = ?report.average_memory_mib,
            "Ingestion run complete"
        );
        report
    }
}
