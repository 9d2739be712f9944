//! Chunked file cache
//!
//! Builds and caches a [`FilesIndex`] per (peer, record): the ordered
//! fixed-size chunk table a remote peer walks to pull large file
//! payloads incrementally. Entries expire a fixed TTL after insertion
//! and the cache is capacity-bounded with LRU eviction; invalidation is
//! always wholesale, an index is rebuilt from scratch on miss.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::DEFAULT_CHUNK_SIZE;
use crate::record::{PasteRecord, RecordId};
use crate::store::RecordStore;

/// Per-file metadata inside an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Path relative to the transfer root (the file name for top-level
    /// clipboard files)
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
    /// SHA-256 of the whole file, hex encoded
    pub sha256: String,
    /// Absolute local path chunks are read from
    pub local_path: std::path::PathBuf,
}

/// One fixed-size byte range of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef {
    /// Index into [`FilesIndex::files`]
    pub file: usize,
    /// Byte offset within the file
    pub offset: u64,
    /// Chunk length (only the final chunk of a file may be short)
    pub len: u64,
}

/// Immutable chunk table for one record's file items
#[derive(Debug)]
pub struct FilesIndex {
    pub record_id: RecordId,
    pub chunk_size: u64,
    pub files: Vec<FileMeta>,
    pub chunks: Vec<ChunkRef>,
}

impl FilesIndex {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Read one chunk's bytes from the local filesystem
    pub fn read_chunk(&self, chunk_index: usize) -> std::io::Result<Bytes> {
        let chunk = self.chunks.get(chunk_index).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("chunk {chunk_index} out of range"),
            )
        })?;
        let meta = &self.files[chunk.file];

        let mut file = std::fs::File::open(&meta.local_path)?;
        file.seek(SeekFrom::Start(chunk.offset))?;
        let mut buf = vec![0u8; chunk.len as usize];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Cache tuning
#[derive(Debug, Clone)]
pub struct ChunkCacheConfig {
    /// Maximum number of cached indexes
    pub capacity: usize,
    /// Fixed time-to-live after insertion
    pub ttl: Duration,
    /// Chunk size for newly built indexes
    pub chunk_size: u64,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl: Duration::from_secs(600),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

struct CacheEntry {
    index: Arc<FilesIndex>,
    inserted_at: Instant,
    last_access: Instant,
}

/// Bounded, time-expiring cache of chunk indexes
pub struct FileChunkCache {
    store: Arc<dyn RecordStore>,
    config: ChunkCacheConfig,
    entries: RwLock<HashMap<(Uuid, RecordId), CacheEntry>>,
}

impl FileChunkCache {
    pub fn new(store: Arc<dyn RecordStore>, config: ChunkCacheConfig) -> Self {
        Self {
            store,
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch (building on miss) the index for one (peer, record).
    ///
    /// Returns `None` when the record is gone or has no file items;
    /// callers treat that as "chunk unavailable", not a retryable error.
    pub async fn files_index(&self, peer: Uuid, record_id: RecordId) -> Option<Arc<FilesIndex>> {
        let key = (peer, record_id);

        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(&key) {
                if entry.inserted_at.elapsed() < self.config.ttl {
                    entry.last_access = Instant::now();
                    return Some(Arc::clone(&entry.index));
                }
                debug!("Chunk index for record {} expired, rebuilding", record_id);
                entries.remove(&key);
            }
        }

        let record = match self.store.get_by_id(record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("Record {} not found while building chunk index", record_id);
                return None;
            }
            Err(e) => {
                warn!("Store error building chunk index for {}: {}", record_id, e);
                return None;
            }
        };

        let index = match build_index(&record, self.config.chunk_size) {
            Some(index) => Arc::new(index),
            None => {
                debug!("Record {} has no file items to index", record_id);
                return None;
            }
        };

        let mut entries = self.entries.write().await;
        if entries.len() >= self.config.capacity {
            Self::evict_lru(&mut entries);
        }
        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                index: Arc::clone(&index),
                inserted_at: now,
                last_access: now,
            },
        );
        Some(index)
    }

    /// Drop every cached index for one record (all peers). Called when
    /// the record is tombstoned so pulls fail fast instead of serving
    /// deleted content until TTL expiry.
    pub async fn purge_record(&self, record_id: RecordId) {
        let mut entries = self.entries.write().await;
        entries.retain(|(_, rid), _| *rid != record_id);
    }

    /// Number of live cache entries (expired entries may still count
    /// until their next lookup)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn evict_lru(entries: &mut HashMap<(Uuid, RecordId), CacheEntry>) {
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(k, _)| *k)
        {
            debug!("Evicting chunk index for record {}", oldest.1);
            entries.remove(&oldest);
        }
    }
}

/// Resolve a record's file items into an ordered chunk table. Only
/// file-backed items contribute; scalar items never produce chunks.
fn build_index(record: &PasteRecord, chunk_size: u64) -> Option<FilesIndex> {
    let mut files = Vec::new();
    let mut chunks = Vec::new();

    for item in &record.items {
        for file_ref in item.file_refs() {
            let sha256 = match hash_file(&file_ref.path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Skipping unhashable file {:?}: {}", file_ref.path, e);
                    continue;
                }
            };
            let relative_path = file_ref
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_ref.path.to_string_lossy().into_owned());

            let file_idx = files.len();
            files.push(FileMeta {
                relative_path,
                size: file_ref.size,
                sha256,
                local_path: file_ref.path.clone(),
            });

            let mut offset = 0;
            while offset < file_ref.size {
                let len = chunk_size.min(file_ref.size - offset);
                chunks.push(ChunkRef {
                    file: file_idx,
                    offset,
                    len,
                });
                offset += len;
            }
        }
    }

    if files.is_empty() {
        return None;
    }
    Some(FilesIndex {
        record_id: record.id,
        chunk_size,
        files,
        chunks,
    })
}

fn hash_file(path: &std::path::Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
