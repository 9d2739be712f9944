//! Item aggregator
//!
//! Accumulates extractor outputs for one clipboard snapshot into one
//! atomic record. Each slot walks an explicit state machine so the
//! "no new slots after record creation" invariant is checkable rather
//! than an implicit call-order convention.

use tracing::debug;

use crate::extract::PreCollected;
use crate::payload::FormatDescriptor;
use crate::record::{ItemKind, PasteItem, PasteRecord, RecordId};

/// Lifecycle of one item slot
#[derive(Debug, Clone)]
pub enum SlotState {
    Unstarted,
    PreCollected(PreCollected),
    Loaded(PasteItem),
    Errored(String),
}

impl SlotState {
    fn name(&self) -> &'static str {
        match self {
            SlotState::Unstarted => "unstarted",
            SlotState::PreCollected(_) => "pre_collected",
            SlotState::Loaded(_) => "loaded",
            SlotState::Errored(_) => "errored",
        }
    }
}

/// One slot: a group of mutually-exclusive descriptors for a single
/// semantic kind, in first-seen order
#[derive(Debug)]
pub struct Slot {
    pub kind: ItemKind,
    pub descriptors: Vec<FormatDescriptor>,
    pub state: SlotState,
}

/// Aggregates one snapshot's slots into a record.
///
/// Aggregation for one record is sequential by construction (the watcher
/// delivers one change at a time), so no interior locking is needed;
/// atomicity with respect to persistence comes from only handing the
/// finished record out of [`PasteCollector::complete_collection`].
pub struct PasteCollector {
    expected_slots: usize,
    slots: Vec<Slot>,
    record_created: bool,
}

impl PasteCollector {
    /// Construct with the expected slot count: one slot per distinct
    /// descriptor group found during grouping.
    pub fn new(expected_slots: usize) -> Self {
        Self {
            expected_slots,
            slots: Vec::with_capacity(expected_slots),
            record_created: false,
        }
    }

    /// Open a slot for one descriptor group. Fails once the expected
    /// count is reached or a record was already created.
    pub fn begin_slot(
        &mut self,
        kind: ItemKind,
        descriptors: Vec<FormatDescriptor>,
    ) -> Option<usize> {
        if self.record_created || self.slots.len() >= self.expected_slots {
            debug!(
                "Rejected slot for {}: created={} slots={}/{}",
                kind,
                self.record_created,
                self.slots.len(),
                self.expected_slots
            );
            return None;
        }
        self.slots.push(Slot {
            kind,
            descriptors,
            state: SlotState::Unstarted,
        });
        Some(self.slots.len() - 1)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    /// True while the slot still awaits its pre-collection pass
    pub fn needs_pre_collection(&self, idx: usize) -> bool {
        matches!(
            self.slots.get(idx).map(|s| &s.state),
            Some(SlotState::Unstarted)
        )
    }

    /// True while the slot pre-collected but has not loaded
    pub fn needs_load(&self, idx: usize) -> bool {
        matches!(
            self.slots.get(idx).map(|s| &s.state),
            Some(SlotState::PreCollected(_))
        )
    }

    /// Record a successful pre-collection for the slot
    pub fn set_pre_collected(&mut self, idx: usize, pre: PreCollected) {
        if let Some(slot) = self.slots.get_mut(idx) {
            if matches!(slot.state, SlotState::Unstarted) {
                slot.state = SlotState::PreCollected(pre);
            }
        }
    }

    /// Winning pre-collection for a slot, if it reached that state
    pub fn pre_collected(&self, idx: usize) -> Option<&PreCollected> {
        match self.slots.get(idx).map(|s| &s.state) {
            Some(SlotState::PreCollected(pre)) => Some(pre),
            _ => None,
        }
    }

    /// Record a successfully loaded item for the slot
    pub fn set_loaded(&mut self, idx: usize, item: PasteItem) {
        if let Some(slot) = self.slots.get_mut(idx) {
            if matches!(slot.state, SlotState::PreCollected(_)) {
                slot.state = SlotState::Loaded(item);
            }
        }
    }

    /// Degrade one slot to an error marker; the record proceeds with the
    /// remaining slots.
    pub fn collect_error(&mut self, idx: usize, error: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(idx) {
            let error = error.into();
            debug!(
                "Slot {} ({}) degraded from {}: {}",
                idx,
                slot.kind,
                slot.state.name(),
                error
            );
            slot.state = SlotState::Errored(error);
        }
    }

    /// Create the record shell once pre-collection is done, or report
    /// that nothing record-worthy was found. After this, no new slots
    /// can be opened.
    pub fn create_record_if_any(
        &mut self,
        id: RecordId,
        source_app: Option<String>,
        remote: bool,
    ) -> Option<PasteRecord> {
        let any_collected = self
            .slots
            .iter()
            .any(|s| matches!(s.state, SlotState::PreCollected(_) | SlotState::Loaded(_)));
        if !any_collected {
            return None;
        }
        self.record_created = true;
        Some(PasteRecord::new(id, source_app, remote))
    }

    /// Seal the record with every loaded item in slot order. Returns
    /// `None` when every load failed; such a record must be discarded,
    /// never persisted.
    pub fn complete_collection(&self, mut record: PasteRecord) -> Option<PasteRecord> {
        for slot in &self.slots {
            if let SlotState::Loaded(item) = &slot.state {
                record.items.push(item.clone());
            }
        }
        if record.items.is_empty() {
            debug!("Discarding record {}: no slot survived loading", record.id);
            return None;
        }
        Some(record)
    }

    /// Error markers accumulated during this collection, for diagnostics
    pub fn errors(&self) -> Vec<(usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match &s.state {
                SlotState::Errored(e) => Some((i, e.as_str())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ItemKind;

    fn pre(kind: ItemKind, descriptor: &str) -> PreCollected {
        PreCollected {
            descriptor: descriptor.into(),
            kind,
            declared_size: 1,
            entry_count: 1,
        }
    }

    #[test]
    fn test_slot_state_machine() {
        let mut collector = PasteCollector::new(2);
        let a = collector
            .begin_slot(ItemKind::Text, vec!["text/plain".into()])
            .unwrap();
        assert!(collector.needs_pre_collection(a));
        assert!(!collector.needs_load(a));

        collector.set_pre_collected(a, pre(ItemKind::Text, "text/plain"));
        assert!(!collector.needs_pre_collection(a));
        assert!(collector.needs_load(a));

        collector.set_loaded(a, PasteItem::text("x"));
        assert!(!collector.needs_load(a));
    }

    #[test]
    fn test_no_record_without_any_pre_collection() {
        let mut collector = PasteCollector::new(1);
        let a = collector
            .begin_slot(ItemKind::Text, vec!["text/plain".into()])
            .unwrap();
        collector.collect_error(a, "boom");
        assert!(collector.create_record_if_any(1, None, false).is_none());
    }

    #[test]
    fn test_no_new_slots_after_record_created() {
        let mut collector = PasteCollector::new(3);
        let a = collector
            .begin_slot(ItemKind::Text, vec!["text/plain".into()])
            .unwrap();
        collector.set_pre_collected(a, pre(ItemKind::Text, "text/plain"));
        let record = collector.create_record_if_any(5, None, false);
        assert!(record.is_some());
        assert!(collector
            .begin_slot(ItemKind::Html, vec!["text/html".into()])
            .is_none());
    }

    #[test]
    fn test_complete_discards_when_all_loads_failed() {
        let mut collector = PasteCollector::new(1);
        let a = collector
            .begin_slot(ItemKind::Text, vec!["text/plain".into()])
            .unwrap();
        collector.set_pre_collected(a, pre(ItemKind::Text, "text/plain"));
        let record = collector.create_record_if_any(9, None, false).unwrap();
        collector.collect_error(a, "load exploded");
        assert!(collector.complete_collection(record).is_none());
        assert_eq!(collector.errors().len(), 1);
    }

    #[test]
    fn test_items_keep_slot_order() {
        let mut collector = PasteCollector::new(2);
        let a = collector
            .begin_slot(ItemKind::Html, vec!["text/html".into()])
            .unwrap();
        let b = collector
            .begin_slot(ItemKind::Text, vec!["text/plain".into()])
            .unwrap();
        collector.set_pre_collected(a, pre(ItemKind::Html, "text/html"));
        collector.set_pre_collected(b, pre(ItemKind::Text, "text/plain"));
        let record = collector.create_record_if_any(1, None, false).unwrap();
        collector.set_loaded(a, PasteItem::html("<p>x</p>"));
        collector.set_loaded(b, PasteItem::text("x"));
        let record = collector.complete_collection(record).unwrap();
        assert_eq!(record.items[0].kind(), ItemKind::Html);
        assert_eq!(record.items[1].kind(), ItemKind::Text);
    }
}
