//! Outbound pipeline
//!
//! Renders a structured record back into a native clipboard payload.
//! In full mode items are added in reverse priority order: platforms
//! whose clipboard APIs treat the last-added representation as the
//! default then still resolve to the highest-priority item.

use std::sync::Arc;
use tracing::debug;

use crate::extract::ExtractorRegistry;
use crate::payload::NativePayload;
use crate::record::{PasteItem, PasteRecord};

/// Rendering controls for one produce call
#[derive(Debug, Clone, Copy, Default)]
pub struct ProduceOptions {
    /// Stamp the local-only marker so our own watcher skips this payload
    pub local_only: bool,
    /// Drop file and image items entirely (local paths would be
    /// meaningless at the destination)
    pub filter_file_types: bool,
    /// Render only the highest-priority item (single-type write)
    pub primary_only: bool,
}

/// Outbound pipeline: record in, native payload out
pub struct OutboundPipeline {
    registry: Arc<ExtractorRegistry>,
}

impl OutboundPipeline {
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self { registry }
    }

    /// Render a record. Returns `None` when no item was eligible; the
    /// caller must not clear the clipboard in that case.
    pub fn produce(&self, record: &PasteRecord, opts: ProduceOptions) -> Option<NativePayload> {
        let eligible: Vec<&PasteItem> = record
            .items
            .iter()
            .filter(|item| !(opts.filter_file_types && item.kind().is_file_backed()))
            .collect();

        let selected: Vec<&PasteItem> = if opts.primary_only {
            eligible.into_iter().take(1).collect()
        } else {
            eligible.into_iter().rev().collect()
        };

        let mut payload = NativePayload::new();
        for item in selected {
            match self
                .registry
                .renderer_for(item.kind())
                .map(|r| r.render(item))
            {
                Some(Ok((descriptor, data))) => payload.push(descriptor, data),
                Some(Err(e)) => debug!("Skipping unrenderable {} item: {}", item.kind(), e),
                None => debug!("No renderer registered for {}", item.kind()),
            }
        }

        if payload.is_empty() {
            return None;
        }
        if opts.local_only {
            payload.mark_local_only();
        }
        Some(payload)
    }

    /// Render a single item outside any record context
    pub fn produce_item(&self, item: &PasteItem, opts: ProduceOptions) -> Option<NativePayload> {
        let mut record = PasteRecord::new(0, None, false);
        record.items.push(item.clone());
        self.produce(&record, opts)
    }
}
