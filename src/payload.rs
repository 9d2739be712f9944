//! Native clipboard payload model
//!
//! A [`NativePayload`] is the portable view of one clipboard snapshot: an
//! ordered list of named format representations. Platform backends build
//! one from OS reads; the outbound pipeline builds one for write-back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker format stamped on payloads written by our own outbound pipeline.
///
/// The inbound pipeline short-circuits on it so the application never
/// re-ingests content it just wrote.
pub const LOCAL_ONLY_MARKER: &str = "application/x-pastesync-local-only";

/// Identifier for one native clipboard representation.
///
/// Many descriptors can map to the same semantic item kind; the extractor
/// registry resolves the many-to-one mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatDescriptor(String);

impl FormatDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormatDescriptor {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One representation within a payload
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEntry {
    /// Format descriptor naming this representation
    pub descriptor: FormatDescriptor,
    /// Raw bytes as the OS exposes them
    pub data: Bytes,
}

/// Ordered set of clipboard representations for one snapshot.
///
/// Order is significant: it is the order the clipboard reported its
/// formats in, and it defines item priority downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativePayload {
    entries: Vec<PayloadEntry>,
}

impl NativePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a representation, keeping first-seen order.
    ///
    /// A duplicate descriptor replaces the earlier data in place rather
    /// than reordering.
    pub fn push(&mut self, descriptor: impl Into<FormatDescriptor>, data: impl Into<Bytes>) {
        let descriptor = descriptor.into();
        let data = data.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.descriptor == descriptor) {
            entry.data = data;
        } else {
            self.entries.push(PayloadEntry { descriptor, data });
        }
    }

    /// Look up the data for one descriptor
    pub fn get(&self, descriptor: &FormatDescriptor) -> Option<&Bytes> {
        self.entries
            .iter()
            .find(|e| e.descriptor == *descriptor)
            .map(|e| &e.data)
    }

    /// Descriptors in clipboard-reported order
    pub fn descriptors(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// All entries in order
    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes across all representations
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.data.len()).sum()
    }

    /// True when this payload was written by our own outbound pipeline
    pub fn has_local_only_marker(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.descriptor.as_str() == LOCAL_ONLY_MARKER)
    }

    /// Stamp the local-only marker onto this payload
    pub fn mark_local_only(&mut self) {
        self.push(LOCAL_ONLY_MARKER, Bytes::new());
    }

    /// Stable content fingerprint over all entries, used for last-seen
    /// dedupe and ownership tracking.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.descriptor.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(&entry.data);
            hasher.update([0xffu8]);
        }
        hex::encode(hasher.finalize())
    }
}
