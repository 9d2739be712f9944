//! Large-payload transfer support
//!
//! File items are shipped to peers as fixed-size chunks pulled on
//! demand. [`chunks`] owns the chunk index cache; [`tracker`] tracks
//! fractional completion of a record's delivery across concurrent
//! tasks.

pub mod chunks;
pub mod tracker;

pub use chunks::{ChunkCacheConfig, FileChunkCache, FilesIndex};
pub use tracker::{SyncTracker, TransferHandle};

/// Default chunk size for peer file transfer (1MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
