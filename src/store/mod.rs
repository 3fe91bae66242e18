//! Document record store collaborator.
//!
//! Records are keyed by local storage path. Writes for distinct paths are independent, so
//! workers share one store handle without extra locking on their side. Stores are opened
//! before a run and closed after it; writes after `close` fail with
//! [`PersistError::Closed`].

mod json;
mod memory;
pub mod types;

use async_trait::async_trait;

pub use json::JsonFileRecordStore;
pub use memory::InMemoryRecordStore;
pub use types::{DocumentRecord, DocumentStatus, PersistError, RecordRef, RecordUpdate};

/// Interface implemented by record store backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record. An existing record with the same storage path is replaced.
    async fn create_record(&self, record: DocumentRecord) -> Result<RecordRef, PersistError>;

    /// Update the record matched by `storage_path`.
    async fn update_record(
        &self,
        storage_path: &str,
        update: RecordUpdate,
    ) -> Result<(), PersistError>;

    /// Set the record matched by `storage_path` to [`DocumentStatus::Failed`], keeping any
    /// fields already written.
    async fn mark_failed(&self, storage_path: &str) -> Result<(), PersistError>;

    /// Look up a record by storage path.
    async fn find_by_path(&self, storage_path: &str)
    -> Result<Option<DocumentRecord>, PersistError>;

    /// All records ordered by storage path.
    async fn records(&self) -> Result<Vec<DocumentRecord>, PersistError>;

    /// Flush pending state and reject further writes.
    async fn close(&self) -> Result<(), PersistError>;
}
