//! Paste record data model
//!
//! A [`PasteRecord`] is one atomic clipboard snapshot composed of one or
//! more typed [`PasteItem`]s. Records are tombstoned rather than deleted
//! so a deletion can itself be propagated to peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Monotonic record identifier, assigned once and never reused
pub type RecordId = u64;

/// Semantic kind of one decoded clipboard item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Text,
    Url,
    Html,
    Rtf,
    Color,
    FileList,
    ImageList,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Url => "url",
            ItemKind::Html => "html",
            ItemKind::Rtf => "rtf",
            ItemKind::Color => "color",
            ItemKind::FileList => "file_list",
            ItemKind::ImageList => "image_list",
        }
    }

    /// File-backed kinds reference on-disk paths instead of inline data
    pub fn is_file_backed(&self) -> bool {
        matches!(self, ItemKind::FileList | ItemKind::ImageList)
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one on-disk file belonging to a file or image item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Absolute path on the origin device
    pub path: PathBuf,
    /// File size in bytes at capture time
    pub size: u64,
}

/// Type-specific item payload; inline for small kinds, path references
/// for file-backed kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Text { value: String },
    Url { value: String },
    Html { value: String },
    Rtf { value: String },
    /// Color packed as 0xAARRGGBB
    Color { argb: u32 },
    FileList { files: Vec<FileRef> },
    ImageList { images: Vec<FileRef> },
}

/// One typed payload within a record, immutable once fully extracted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasteItem {
    /// Byte size of the decoded content
    pub size: u64,
    #[serde(flatten)]
    pub payload: ItemPayload,
}

impl PasteItem {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            size: value.len() as u64,
            payload: ItemPayload::Text { value },
        }
    }

    pub fn url(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            size: value.len() as u64,
            payload: ItemPayload::Url { value },
        }
    }

    pub fn html(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            size: value.len() as u64,
            payload: ItemPayload::Html { value },
        }
    }

    pub fn rtf(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            size: value.len() as u64,
            payload: ItemPayload::Rtf { value },
        }
    }

    pub fn color(argb: u32) -> Self {
        Self {
            size: 4,
            payload: ItemPayload::Color { argb },
        }
    }

    pub fn file_list(files: Vec<FileRef>) -> Self {
        let size = files.iter().map(|f| f.size).sum();
        Self {
            size,
            payload: ItemPayload::FileList { files },
        }
    }

    pub fn image_list(images: Vec<FileRef>) -> Self {
        let size = images.iter().map(|f| f.size).sum();
        Self {
            size,
            payload: ItemPayload::ImageList { images },
        }
    }

    /// Kind tag, derived from the payload variant so the two can never
    /// fall out of sync
    pub fn kind(&self) -> ItemKind {
        match &self.payload {
            ItemPayload::Text { .. } => ItemKind::Text,
            ItemPayload::Url { .. } => ItemKind::Url,
            ItemPayload::Html { .. } => ItemKind::Html,
            ItemPayload::Rtf { .. } => ItemKind::Rtf,
            ItemPayload::Color { .. } => ItemKind::Color,
            ItemPayload::FileList { .. } => ItemKind::FileList,
            ItemPayload::ImageList { .. } => ItemKind::ImageList,
        }
    }

    /// File references for file-backed items, empty otherwise
    pub fn file_refs(&self) -> &[FileRef] {
        match &self.payload {
            ItemPayload::FileList { files } => files,
            ItemPayload::ImageList { images } => images,
            _ => &[],
        }
    }
}

/// Identity a record carries on the device it was captured on.
///
/// Replicas re-key incoming records into their own id space, so a
/// tombstone travels as the origin identity and each device resolves
/// it to its local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrigin {
    /// Device the record was first captured on
    pub device: Uuid,
    /// The record's id on that device
    pub id: RecordId,
}

/// One atomic clipboard snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasteRecord {
    /// Monotonic id, assigned once at creation
    pub id: RecordId,
    /// Where the record was first captured; `None` until it crosses a
    /// device boundary
    #[serde(default)]
    pub origin: Option<RecordOrigin>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// True when the record arrived from a peer rather than the local OS
    pub remote: bool,
    /// Name of the application that owned the clipboard, when known
    pub source_app: Option<String>,
    /// Soft-delete flag; tombstoned records are kept so deletions sync
    pub tombstoned: bool,
    /// User favorite flag
    pub favorite: bool,
    /// Decoded items in slot-priority order (first is highest priority)
    pub items: Vec<PasteItem>,
}

impl PasteRecord {
    pub fn new(id: RecordId, source_app: Option<String>, remote: bool) -> Self {
        Self {
            id,
            origin: None,
            created_at: Utc::now(),
            remote,
            source_app,
            tombstoned: false,
            favorite: false,
            items: Vec::new(),
        }
    }

    /// Total decoded size across all items
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size).sum()
    }

    /// True when any item is file-backed
    pub fn has_file_items(&self) -> bool {
        self.items.iter().any(|i| i.kind().is_file_backed())
    }
}

/// Allocator for record ids, seeded from the store's max assigned id
#[derive(Debug)]
pub struct RecordIdAllocator {
    next: AtomicU64,
}

impl RecordIdAllocator {
    /// Seed with the highest id already persisted (0 when empty)
    pub fn new(max_assigned: RecordId) -> Self {
        Self {
            next: AtomicU64::new(max_assigned + 1),
        }
    }

    /// Hand out the next id; ids are never reused even if the record is
    /// later discarded
    pub fn next_id(&self) -> RecordId {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
