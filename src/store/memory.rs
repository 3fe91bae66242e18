use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::RecordStore;
use super::types::{DocumentRecord, DocumentStatus, PersistError, RecordRef, RecordUpdate};

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<String, DocumentRecord>,
    closed: bool,
}

/// Process-local record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<State>,
}

impl InMemoryRecordStore {
    /// Create an empty, open store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.storage_path.clone(), record))
            .collect();
        Self {
            state: RwLock::new(State {
                records,
                closed: false,
            }),
        }
    }

    /// Mark the store closed and hand back its records.
    pub(crate) async fn seal(&self) -> Vec<DocumentRecord> {
        let mut state = self.state.write().await;
        state.closed = true;
        state.records.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_record(&self, record: DocumentRecord) -> Result<RecordRef, PersistError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(PersistError::Closed);
        }
        let reference = RecordRef {
            record_id: record.record_id,
            storage_path: record.storage_path.clone(),
        };
        if let Some(previous) = state
            .records
            .insert(record.storage_path.clone(), record)
        {
            tracing::debug!(
                storage_path = %reference.storage_path,
                previous_record = %previous.record_id,
                "Replaced existing record"
            );
        }
        Ok(reference)
    }

    async fn update_record(
        &self,
        storage_path: &str,
        update: RecordUpdate,
    ) -> Result<(), PersistError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(PersistError::Closed);
        }
        let record = state
            .records
            .get_mut(storage_path)
            .ok_or_else(|| PersistError::NotFound(storage_path.to_string()))?;
        record.apply(&update);
        Ok(())
    }

    async fn mark_failed(&self, storage_path: &str) -> Result<(), PersistError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(PersistError::Closed);
        }
        let record = state
            .records
            .get_mut(storage_path)
            .ok_or_else(|| PersistError::NotFound(storage_path.to_string()))?;
        record.status = DocumentStatus::Failed;
        Ok(())
    }

    async fn find_by_path(
        &self,
        storage_path: &str,
    ) -> Result<Option<DocumentRecord>, PersistError> {
        Ok(self.state.read().await.records.get(storage_path).cloned())
    }

    async fn records(&self) -> Result<Vec<DocumentRecord>, PersistError> {
        Ok(self.state.read().await.records.values().cloned().collect())
    }

    async fn close(&self) -> Result<(), PersistError> {
        self.seal().await;
        Ok(())
    }
}
