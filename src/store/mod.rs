//! Record store
//!
//! Narrow persistence seam for paste records. The core needs only a
//! handful of verbs; the SQLite implementation is the production one,
//! the in-memory store backs tests and the loopback engine.

pub mod sqlite;

pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::record::{PasteRecord, RecordId, RecordOrigin};
use uuid::Uuid;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Item list (de)serialization failure
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure creating the database directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record does not exist
    #[error("Record {0} not found")]
    NotFound(RecordId),
}

/// Persistence collaborator for paste records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record or update an existing one atomically
    async fn insert_or_update(&self, record: &PasteRecord) -> Result<(), StoreError>;

    /// Fetch a record by id; tombstoned records are still returned
    async fn get_by_id(&self, id: RecordId) -> Result<Option<PasteRecord>, StoreError>;

    /// Fetch the local replica of a record first captured elsewhere
    async fn find_by_origin(
        &self,
        origin_device: Uuid,
        origin_id: RecordId,
    ) -> Result<Option<PasteRecord>, StoreError>;

    /// Soft-delete: flip the tombstone flag, keep the row
    async fn mark_tombstoned(&self, id: RecordId) -> Result<(), StoreError>;

    /// Highest id ever assigned (0 when empty); seeds the id allocator
    async fn max_assigned_id(&self) -> Result<RecordId, StoreError>;

    /// Set or clear the favorite flag
    async fn set_favorite(&self, id: RecordId, favorite: bool) -> Result<(), StoreError>;

    /// Most recent non-tombstoned records, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<PasteRecord>, StoreError>;
}

/// In-memory record store for tests and the loopback engine
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<RecordId, PasteRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_or_update(&self, record: &PasteRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: RecordId) -> Result<Option<PasteRecord>, StoreError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn find_by_origin(
        &self,
        origin_device: Uuid,
        origin_id: RecordId,
    ) -> Result<Option<PasteRecord>, StoreError> {
        let wanted = RecordOrigin {
            device: origin_device,
            id: origin_id,
        };
        Ok(self
            .records
            .lock()
            .await
            .values()
            .find(|r| r.origin == Some(wanted))
            .cloned())
    }

    async fn mark_tombstoned(&self, id: RecordId) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) => {
                record.tombstoned = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn max_assigned_id(&self) -> Result<RecordId, StoreError> {
        Ok(self.records.lock().await.keys().max().copied().unwrap_or(0))
    }

    async fn set_favorite(&self, id: RecordId, favorite: bool) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) => {
                record.favorite = favorite;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<PasteRecord>, StoreError> {
        let records = self.records.lock().await;
        let mut all: Vec<PasteRecord> = records
            .values()
            .filter(|r| !r.tombstoned)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PasteItem;

    #[tokio::test]
    async fn test_memory_store_tombstone_keeps_row() {
        let store = MemoryRecordStore::new();
        let mut record = PasteRecord::new(1, None, false);
        record.items.push(PasteItem::text("x"));
        store.insert_or_update(&record).await.unwrap();

        store.mark_tombstoned(1).await.unwrap();
        let back = store.get_by_id(1).await.unwrap().unwrap();
        assert!(back.tombstoned);
        assert!(store.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_find_by_origin() {
        let store = MemoryRecordStore::new();
        let device = Uuid::new_v4();
        let mut replica = PasteRecord::new(2, None, true);
        replica.origin = Some(RecordOrigin { device, id: 1 });
        store.insert_or_update(&replica).await.unwrap();

        let found = store.find_by_origin(device, 1).await.unwrap().unwrap();
        assert_eq!(found.id, 2);
        assert!(store
            .find_by_origin(Uuid::new_v4(), 1)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_max_assigned_id() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.max_assigned_id().await.unwrap(), 0);
        store
            .insert_or_update(&PasteRecord::new(17, None, false))
            .await
            .unwrap();
        assert_eq!(store.max_assigned_id().await.unwrap(), 17);
    }
}
