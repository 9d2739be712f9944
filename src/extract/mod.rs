//! Format extractors
//!
//! One extractor per semantic item kind. Each extractor declares which
//! format descriptors it claims and follows a two-phase protocol:
//! a cheap metadata-only `pre_collect` followed by an expensive `load`.
//! The split lets the aggregator fix the total slot count before any
//! expensive I/O is committed.
//!
//! Extractors also own the reverse direction: `render` turns a loaded
//! item back into one native representation for the outbound pipeline.

use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, PasteItem};

pub mod color;
pub mod files;
pub mod image;
pub mod markup;
pub mod text;
pub mod url;

/// Extraction errors are always per-slot: they degrade a single item,
/// never the whole record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The payload does not carry the requested descriptor
    #[error("Descriptor not present in payload: {0}")]
    Missing(String),

    /// Representation present but undecodable
    #[error("Failed to decode {0}: {1}")]
    Decode(String, String),

    /// Representation present but empty
    #[error("Empty representation for {0}")]
    Empty(String),

    /// Filesystem access during load
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Item cannot be rendered back to this representation
    #[error("Cannot render item of kind {0}")]
    Unrenderable(ItemKind),
}

/// Result of a successful pre-collection pass: enough metadata to commit
/// a slot without having read any bulk data.
#[derive(Debug, Clone)]
pub struct PreCollected {
    /// The winning descriptor for this slot
    pub descriptor: FormatDescriptor,
    /// Kind the extractor will produce
    pub kind: ItemKind,
    /// Declared size in bytes, from metadata only
    pub declared_size: u64,
    /// Number of constituent entries (files in a list, 1 for scalars)
    pub entry_count: usize,
}

/// Decoder/renderer pair for one semantic item kind
pub trait FormatExtractor: Send + Sync {
    /// Kind this extractor is authoritative for
    fn kind(&self) -> ItemKind;

    /// Descriptor identifiers this extractor claims
    fn claims(&self) -> &'static [&'static str];

    /// Cheap metadata-only phase. Must not read bulk data, write files,
    /// or compute hashes.
    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError>;

    /// Expensive phase: decode bytes, stage temp files. Failure degrades
    /// this slot only.
    fn load(
        &self,
        pre: &PreCollected,
        payload: &NativePayload,
        scratch: &Path,
    ) -> Result<PasteItem, ExtractError>;

    /// Render a loaded item back into one native representation
    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError>;
}

/// Static descriptor-to-extractor dispatch, built once at startup from
/// each extractor's declared identifier list. Unknown descriptors are
/// simply unclaimed, never an error.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn FormatExtractor>>,
    by_descriptor: HashMap<&'static str, usize>,
    by_kind: HashMap<ItemKind, usize>,
}

impl ExtractorRegistry {
    /// Build a registry from an explicit extractor set
    pub fn new(extractors: Vec<Arc<dyn FormatExtractor>>) -> Self {
        let mut by_descriptor = HashMap::new();
        let mut by_kind = HashMap::new();
        for (idx, extractor) in extractors.iter().enumerate() {
            by_kind.insert(extractor.kind(), idx);
            for id in extractor.claims() {
                by_descriptor.insert(*id, idx);
            }
        }
        Self {
            extractors,
            by_descriptor,
            by_kind,
        }
    }

    /// Registry with the full built-in extractor set
    pub fn with_default_extractors() -> Self {
        Self::new(vec![
            Arc::new(text::TextExtractor),
            Arc::new(url::UrlExtractor),
            Arc::new(markup::HtmlExtractor),
            Arc::new(markup::RtfExtractor),
            Arc::new(color::ColorExtractor),
            Arc::new(files::FileListExtractor),
            Arc::new(image::ImageListExtractor),
        ])
    }

    /// Extractor claiming the given descriptor, if any
    pub fn extractor_for(&self, descriptor: &FormatDescriptor) -> Option<&Arc<dyn FormatExtractor>> {
        self.by_descriptor
            .get(descriptor.as_str())
            .map(|idx| &self.extractors[*idx])
    }

    /// Authoritative renderer for one item kind
    pub fn renderer_for(&self, kind: ItemKind) -> Option<&Arc<dyn FormatExtractor>> {
        self.by_kind.get(&kind).map(|idx| &self.extractors[*idx])
    }
}

/// Shared helper: fetch a descriptor's bytes or fail with the right
/// per-slot error.
fn require_entry<'a>(
    descriptor: &FormatDescriptor,
    payload: &'a NativePayload,
) -> Result<&'a Bytes, ExtractError> {
    let data = payload
        .get(descriptor)
        .ok_or_else(|| ExtractError::Missing(descriptor.to_string()))?;
    if data.is_empty() {
        return Err(ExtractError::Empty(descriptor.to_string()));
    }
    Ok(data)
}

/// Shared helper: strict UTF-8 decode with a per-slot error.
fn decode_utf8(descriptor: &FormatDescriptor, data: &Bytes) -> Result<String, ExtractError> {
    String::from_utf8(data.to_vec())
        .map_err(|e| ExtractError::Decode(descriptor.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_claims_are_disjoint() {
        let registry = ExtractorRegistry::with_default_extractors();
        let mut seen = HashMap::new();
        for extractor in &registry.extractors {
            for id in extractor.claims() {
                if let Some(prev) = seen.insert(*id, extractor.kind()) {
                    panic!("descriptor {} claimed by {} and {}", id, prev, extractor.kind());
                }
            }
        }
    }

    #[test]
    fn test_unknown_descriptor_is_unclaimed() {
        let registry = ExtractorRegistry::with_default_extractors();
        assert!(registry
            .extractor_for(&"application/x-never-heard-of-it".into())
            .is_none());
    }

    #[test]
    fn test_every_kind_has_a_renderer() {
        let registry = ExtractorRegistry::with_default_extractors();
        for kind in [
            ItemKind::Text,
            ItemKind::Url,
            ItemKind::Html,
            ItemKind::Rtf,
            ItemKind::Color,
            ItemKind::FileList,
            ItemKind::ImageList,
        ] {
            assert!(registry.renderer_for(kind).is_some(), "no renderer for {kind}");
        }
    }
}
