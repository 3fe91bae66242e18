use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Per-document contribution recorded once its pipeline has stored the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentSample {
    /// Time spent fetching and writing the document bytes.
    pub fetch: Duration,
    /// Time spent turning stored bytes into text.
    pub extract: Duration,
    /// Process memory sampled when the pipeline finished, in bytes.
    pub memory_bytes: u64,
}

/// Run-scoped counters shared by every worker.
///
/// Each field is updated with an atomic read-modify-write, so totals equal the sum of the
/// recorded samples regardless of how workers interleave. Read the totals once the run has
/// drained; a snapshot taken mid-run may mix fields from different samples.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    fetch_nanos: AtomicU64,
    extract_nanos: AtomicU64,
    memory_bytes: AtomicU64,
    documents: AtomicU64,
}

impl MetricsAccumulator {
    /// Create an empty accumulator for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one stored document's measurements.
    pub fn record_document(&self, sample: DocumentSample) {
        self.fetch_nanos
            .fetch_add(duration_nanos(sample.fetch), Ordering::Relaxed);
        self.extract_nanos
            .fetch_add(duration_nanos(sample.extract), Ordering::Relaxed);
        self.memory_bytes
            .fetch_add(sample.memory_bytes, Ordering::Relaxed);
        self.documents.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_fetch_time: Duration::from_nanos(self.fetch_nanos.load(Ordering::Relaxed)),
            total_extract_time: Duration::from_nanos(self.extract_nanos.load(Ordering::Relaxed)),
            total_memory_bytes: self.memory_bytes.load(Ordering::Relaxed),
            documents: self.documents.load(Ordering::Relaxed),
        }
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Immutable view of the run counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Sum of fetch durations over stored documents.
    pub total_fetch_time: Duration,
    /// Sum of extraction durations over stored documents.
    pub total_extract_time: Duration,
    /// Sum of memory samples over stored documents, in bytes.
    pub total_memory_bytes: u64,
    /// Number of documents that contributed a sample.
    pub documents: u64,
}

impl MetricsSnapshot {
    /// Mean memory sample per stored document in MiB, or `None` when nothing was stored.
    pub fn average_memory_mib(&self) -> Option<f64> {
        (self.documents > 0)
            .then(|| self.total_memory_bytes as f64 / BYTES_PER_MIB / self.documents as f64)
    }
}

/// Source of the memory figure attached to each document sample.
pub trait MemoryProbe: Send + Sync {
    /// Current memory usage in bytes.
    fn sample_bytes(&self) -> u64;
}

/// Samples system-wide used memory through `sysinfo`.
///
/// This is the figure the report averages, and it is only illustrative: it measures the whole
/// machine at the moment a pipeline finishes, so concurrent documents and unrelated processes
/// all leak into each sample. Nothing in it is attributable to a single document.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryProbe;

impl MemoryProbe for SystemMemoryProbe {
    fn sample_bytes(&self) -> u64 {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        system.used_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(fetch_ms: u64, extract_ms: u64, memory_bytes: u64) -> DocumentSample {
        DocumentSample {
            fetch: Duration::from_millis(fetch_ms),
            extract: Duration::from_millis(extract_ms),
            memory_bytes,
        }
    }

    #[test]
    fn records_samples() {
        let metrics = MetricsAccumulator::new();
        metrics.record_document(sample(10, 5, 1024));
        metrics.record_document(sample(20, 7, 2048));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents, 2);
        assert_eq!(snapshot.total_fetch_time, Duration::from_millis(30));
        assert_eq!(snapshot.total_extract_time, Duration::from_millis(12));
        assert_eq!(snapshot.total_memory_bytes, 3072);
    }

    #[test]
    fn empty_snapshot_has_no_average() {
        let metrics = MetricsAccumulator::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert!(metrics.snapshot().average_memory_mib().is_none());
    }

    #[test]
    fn average_memory_is_per_document_mib() {
        let metrics = MetricsAccumulator::new();
        metrics.record_document(sample(0, 0, 1024 * 1024));
        metrics.record_document(sample(0, 0, 3 * 1024 * 1024));
        let average = metrics.snapshot().average_memory_mib().expect("average");
        assert!((average - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_totals_match_sequential_sum() {
        let metrics = Arc::new(MetricsAccumulator::new());
        let samples: Vec<DocumentSample> = (0..200u64)
            .map(|i| sample(i % 17 + 1, i % 5, i * 31))
            .collect();

        let mut tasks = tokio::task::JoinSet::new();
        for chunk in samples.chunks(7) {
            let metrics = Arc::clone(&metrics);
            let chunk = chunk.to_vec();
            tasks.spawn(async move {
                for sample in chunk {
                    metrics.record_document(sample);
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.expect("task");
        }

        let expected = samples
            .iter()
            .fold(MetricsSnapshot::default(), |mut acc, sample| {
                acc.total_fetch_time += sample.fetch;
                acc.total_extract_time += sample.extract;
                acc.total_memory_bytes += sample.memory_bytes;
                acc.documents += 1;
                acc
            });
        assert_eq!(metrics.snapshot(), expected);
    }

    #[test]
    fn system_probe_reports_nonzero_memory() {
        assert!(SystemMemoryProbe.sample_bytes() > 0);
    }
}
