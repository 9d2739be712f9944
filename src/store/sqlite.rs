//! SQLite record store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::Mutex;

use super::{RecordStore, StoreError};
use crate::record::{PasteItem, PasteRecord, RecordId, RecordOrigin};
use uuid::Uuid;

const SCHEMA_VERSION: u32 = 1;

/// SQLite-backed record store
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at the given path
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent reader/writer access
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let version = Self::schema_version(&conn)?;
        if version == 0 {
            Self::create_schema(&conn)?;
        } else if version < SCHEMA_VERSION {
            Self::migrate_schema(&conn, version)?;
        }
        Ok(())
    }

    fn schema_version(conn: &Connection) -> Result<u32, StoreError> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;
        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    fn create_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS paste_records (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                remote INTEGER NOT NULL DEFAULT 0,
                source_app TEXT,
                tombstoned INTEGER NOT NULL DEFAULT 0,
                favorite INTEGER NOT NULL DEFAULT 0,
                items TEXT NOT NULL,
                total_size INTEGER NOT NULL DEFAULT 0,
                origin_device TEXT,
                origin_id INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_records_created ON paste_records(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_records_tombstoned ON paste_records(tombstoned);
            CREATE INDEX IF NOT EXISTS idx_records_origin ON paste_records(origin_device, origin_id);
            ",
        )?;

        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn migrate_schema(_conn: &Connection, _from_version: u32) -> Result<(), StoreError> {
        // Future migrations would go here
        Ok(())
    }

    fn row_to_record(row: &Row) -> Result<PasteRecord, StoreError> {
        let id: i64 = row.get(0)?;
        let created_at: i64 = row.get(1)?;
        let remote: i64 = row.get(2)?;
        let source_app: Option<String> = row.get(3)?;
        let tombstoned: i64 = row.get(4)?;
        let favorite: i64 = row.get(5)?;
        let items_json: String = row.get(6)?;
        let origin_device: Option<String> = row.get(7)?;
        let origin_id: Option<i64> = row.get(8)?;

        let items: Vec<PasteItem> = serde_json::from_str(&items_json)?;
        let created_at = DateTime::<Utc>::from_timestamp(created_at, 0).unwrap_or_else(Utc::now);
        let origin = match (origin_device, origin_id) {
            (Some(device), Some(origin_id)) => {
                Uuid::parse_str(&device).ok().map(|device| RecordOrigin {
                    device,
                    id: origin_id as RecordId,
                })
            }
            _ => None,
        };

        Ok(PasteRecord {
            id: id as RecordId,
            origin,
            created_at,
            remote: remote != 0,
            source_app,
            tombstoned: tombstoned != 0,
            favorite: favorite != 0,
            items,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_or_update(&self, record: &PasteRecord) -> Result<(), StoreError> {
        let items_json = serde_json::to_string(&record.items)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO paste_records
             (id, created_at, remote, source_app, tombstoned, favorite, items, total_size,
              origin_device, origin_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 remote = excluded.remote,
                 source_app = excluded.source_app,
                 tombstoned = excluded.tombstoned,
                 favorite = excluded.favorite,
                 items = excluded.items,
                 total_size = excluded.total_size,
                 origin_device = excluded.origin_device,
                 origin_id = excluded.origin_id",
            params![
                record.id as i64,
                record.created_at.timestamp(),
                record.remote as i64,
                record.source_app,
                record.tombstoned as i64,
                record.favorite as i64,
                items_json,
                record.total_size() as i64,
                record.origin.map(|o| o.device.to_string()),
                record.origin.map(|o| o.id as i64),
            ],
        )?;
        Ok(())
    }

    async fn get_by_id(&self, id: RecordId) -> Result<Option<PasteRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, created_at, remote, source_app, tombstoned, favorite, items,
                        origin_device, origin_id
                 FROM paste_records WHERE id = ?",
                params![id as i64],
                |row| Ok(Self::row_to_record(row)),
            )
            .optional()?;
        row.transpose()
    }

    async fn find_by_origin(
        &self,
        origin_device: Uuid,
        origin_id: RecordId,
    ) -> Result<Option<PasteRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, created_at, remote, source_app, tombstoned, favorite, items,
                        origin_device, origin_id
                 FROM paste_records WHERE origin_device = ? AND origin_id = ?",
                params![origin_device.to_string(), origin_id as i64],
                |row| Ok(Self::row_to_record(row)),
            )
            .optional()?;
        row.transpose()
    }

    async fn mark_tombstoned(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE paste_records SET tombstoned = 1 WHERE id = ?",
            params![id as i64],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn max_assigned_id(&self) -> Result<RecordId, StoreError> {
        let conn = self.conn.lock().await;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM paste_records", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) as RecordId)
    }

    async fn set_favorite(&self, id: RecordId, favorite: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE paste_records SET favorite = ? WHERE id = ?",
            params![favorite as i64, id as i64],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<PasteRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, remote, source_app, tombstoned, favorite, items,
                    origin_device, origin_id
             FROM paste_records
             WHERE tombstoned = 0
             ORDER BY id DESC
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| Ok(Self::row_to_record(row)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().collect()
    }
}
