use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::RecordStore;
use super::memory::InMemoryRecordStore;
use super::types::{DocumentRecord, PersistError, RecordRef, RecordUpdate};

/// Record store persisted as a JSON array on disk.
///
/// Records live in memory during the run and are written back by [`RecordStore::close`].
/// The file is replaced atomically (temporary file, then rename), so an interrupted flush
/// leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileRecordStore {
    path: PathBuf,
    inner: InMemoryRecordStore,
}

impl JsonFileRecordStore {
    /// Open the store at `path`, loading records from earlier runs when the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let records: Vec<DocumentRecord> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "Opened record store"
        );
        Ok(Self {
            path,
            inner: InMemoryRecordStore::with_records(records),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, records: &[DocumentRecord]) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = serde_json::to_vec_pretty(records)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn create_record(&self, record: DocumentRecord) -> Result<RecordRef, PersistError> {
        self.inner.create_record(record).await
    }

    async fn update_record(
        &self,
        storage_path: &str,
        update: RecordUpdate,
    ) -> Result<(), PersistError> {
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
        let records = self.inner.seal().await;
        self.flush(&records).await?;
        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Record store flushed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentStatus;

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.json");

        let store = JsonFileRecordStore::open(&path).await.expect("open");
        let record = DocumentRecord::initial(
            "a.pdf",
            "doc1",
            "http://x/a.pdf",
            &dir.path().join("a.pdf"),
            3,
            "hash",
        );
        let reference = store.create_record(record).await.expect("create");
        store
            .update_record(
                &reference.storage_path,
                RecordUpdate {
                    summary: "Short.".into(),
                    keywords: vec!["short".into()],
                    status: DocumentStatus::Stored,
                },
            )
            .await
            .expect("update");
        store.close().await.expect("close");

        let reopened = JsonFileRecordStore::open(&path).await.expect("reopen");
        let records = reopened.records().await.expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_id, reference.record_id);
        assert_eq!(records[0].keywords.as_deref(), Some(&["short".to_string()][..]));
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileRecordStore::open(dir.path().join("absent.json"))
            .await
            .expect("open");
        assert!(store.records().await.expect("records").is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.json");
        tokio::fs::write(&path, b"{not json").await.expect("write");
        let error = JsonFileRecordStore::open(&path).await.expect_err("corrupt");
        assert!(matches!(error, PersistError::Serialization(_)));
    }
}
