//! Inbound pipeline
//!
//! Orchestrates format dispatch for one clipboard snapshot: group the
//! payload's descriptors by semantic kind, pre-collect every group,
//! then load only if something record-worthy appeared, then persist.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::collector::PasteCollector;
use super::PipelineError;
use crate::extract::ExtractorRegistry;
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, RecordId, RecordIdAllocator};
use crate::store::RecordStore;

/// Inbound pipeline: native payload in, persisted record id out
pub struct InboundPipeline {
    registry: Arc<ExtractorRegistry>,
    store: Arc<dyn RecordStore>,
    ids: Arc<RecordIdAllocator>,
    scratch: PathBuf,
}

impl InboundPipeline {
    pub fn new(
        registry: Arc<ExtractorRegistry>,
        store: Arc<dyn RecordStore>,
        ids: Arc<RecordIdAllocator>,
        scratch: PathBuf,
    ) -> Self {
        Self {
            registry,
            store,
            ids,
            scratch,
        }
    }

    /// Consume one clipboard snapshot.
    ///
    /// Returns `Ok(None)` when nothing record-worthy was present (no
    /// claimed formats, our own local-only marker, or every load failed)
    /// — in that case the record store is untouched. Extraction failures
    /// never escape; only clipboard-access and store failures do.
    pub async fn consume(
        &self,
        payload: &NativePayload,
        source_app: Option<&str>,
        remote: bool,
    ) -> Result<Option<RecordId>, PipelineError> {
        if payload.has_local_only_marker() {
            debug!("Skipping payload carrying our own local-only marker");
            return Ok(None);
        }

        let groups = self.group_descriptors(payload);
        if groups.is_empty() {
            debug!("No extractor claims any of the {} formats", payload.len());
            return Ok(None);
        }

        let mut collector = PasteCollector::new(groups.len());
        for (kind, descriptors) in groups {
            if let Some(idx) = collector.begin_slot(kind, descriptors) {
                self.pre_collect_slot(&mut collector, idx, payload);
            }
        }

        let id = self.ids.next_id();
        let record =
            match collector.create_record_if_any(id, source_app.map(str::to_string), remote) {
                Some(record) => record,
                None => {
                    debug!("No slot pre-collected; dropping snapshot");
                    return Ok(None);
                }
            };

        for idx in 0..collector.slot_count() {
            if collector.needs_load(idx) {
                self.load_slot(&mut collector, idx, payload);
            }
        }

        let record = match collector.complete_collection(record) {
            Some(record) => record,
            None => return Ok(None),
        };

        for (idx, error) in collector.errors() {
            debug!("Record {}: slot {} degraded: {}", record.id, idx, error);
        }

        self.store.insert_or_update(&record).await?;
        info!(
            "Captured record {} ({} items, {} bytes, source={:?})",
            record.id,
            record.items.len(),
            record.total_size(),
            record.source_app
        );
        Ok(Some(record.id))
    }

    /// Group claimed descriptors by semantic kind, preserving the
    /// clipboard-reported order of first appearance. Unclaimed
    /// descriptors are skipped, never an error.
    fn group_descriptors(&self, payload: &NativePayload) -> Vec<(ItemKind, Vec<FormatDescriptor>)> {
        let mut groups: Vec<(ItemKind, Vec<FormatDescriptor>)> = Vec::new();
        for descriptor in payload.descriptors() {
            let Some(extractor) = self.registry.extractor_for(descriptor) else {
                debug!("No extractor claims {}", descriptor);
                continue;
            };
            let kind = extractor.kind();
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, descriptors)) => descriptors.push(descriptor.clone()),
                None => groups.push((kind, vec![descriptor.clone()])),
            }
        }
        groups
    }

    /// Run pre-collection for one slot: descriptors within a group are
    /// mutually exclusive alternatives, first success wins.
    fn pre_collect_slot(
        &self,
        collector: &mut PasteCollector,
        idx: usize,
        payload: &NativePayload,
    ) {
        let descriptors = match collector.slot(idx) {
            Some(slot) => slot.descriptors.clone(),
            None => return,
        };

        let mut last_error = None;
        for descriptor in &descriptors {
            let Some(extractor) = self.registry.extractor_for(descriptor) else {
                continue;
            };
            match extractor.pre_collect(descriptor, payload) {
                Ok(pre) => {
                    collector.set_pre_collected(idx, pre);
                    return;
                }
                Err(e) => {
                    debug!("Pre-collect failed for {}: {}", descriptor, e);
                    last_error = Some(e.to_string());
                }
            }
        }
        collector.collect_error(idx, last_error.unwrap_or_else(|| "no descriptor usable".into()));
    }

    /// Run the load phase for one pre-collected slot
    fn load_slot(&self, collector: &mut PasteCollector, idx: usize, payload: &NativePayload) {
        let pre = match collector.pre_collected(idx) {
            Some(pre) => pre.clone(),
            None => return,
        };
        let Some(extractor) = self.registry.extractor_for(&pre.descriptor) else {
            collector.collect_error(idx, format!("extractor vanished for {}", pre.descriptor));
            return;
        };
        match extractor.load(&pre, payload, &self.scratch) {
            Ok(item) => collector.set_loaded(idx, item),
            Err(e) => {
                warn!("Load failed for {}: {}", pre.descriptor, e);
                collector.collect_error(idx, e.to_string());
            }
        }
    }
}
