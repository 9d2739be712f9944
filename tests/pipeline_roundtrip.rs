//! Round-trip tests across the inbound and outbound pipelines

use std::sync::Arc;

use pretty_assertions::assert_eq;

use pastesync::extract::ExtractorRegistry;
use pastesync::pipeline::inbound::InboundPipeline;
use pastesync::pipeline::outbound::{OutboundPipeline, ProduceOptions};
use pastesync::record::{PasteItem, PasteRecord, RecordIdAllocator};
use pastesync::store::{MemoryRecordStore, RecordStore};
use tempfile::TempDir;

fn registry() -> Arc<ExtractorRegistry> {
    Arc::new(ExtractorRegistry::with_default_extractors())
}

fn inbound(store: Arc<dyn RecordStore>, scratch: &TempDir) -> InboundPipeline {
    InboundPipeline::new(
        registry(),
        store,
        Arc::new(RecordIdAllocator::new(0)),
        scratch.path().to_path_buf(),
    )
}

#[tokio::test]
async fn test_produce_then_consume_preserves_item_payloads() {
    let scratch = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let inbound = inbound(Arc::clone(&store), &scratch);
    let outbound = OutboundPipeline::new(registry());

    let mut original = PasteRecord::new(1, None, false);
    original.items.push(PasteItem::text("copy me"));
    original.items.push(PasteItem::url("https://example.com/a?b=c"));
    original.items.push(PasteItem::color(0x80ff0080));

    let payload = outbound
        .produce(&original, ProduceOptions::default())
        .expect("record should render");

    let record_id = inbound
        .consume(&payload, Some("round-trip"), false)
        .await
        .unwrap()
        .expect("payload should yield a record");

    let stored = store.get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(stored.items.len(), original.items.len());
    // Payload representation order is reversed relative to item
    // priority, so compare contents rather than positions.
    for item in &original.items {
        assert!(
            stored.items.iter().any(|s| s.payload == item.payload),
            "missing {:?} after round trip",
            item.kind()
        );
    }
}

#[tokio::test]
async fn test_local_only_payload_never_creates_a_record() {
    let scratch = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let inbound = inbound(Arc::clone(&store), &scratch);
    let outbound = OutboundPipeline::new(registry());

    let mut record = PasteRecord::new(1, None, false);
    record.items.push(PasteItem::text("do not echo"));

    let payload = outbound
        .produce(
            &record,
            ProduceOptions {
                local_only: true,
                ..Default::default()
            },
        )
        .unwrap();

    let consumed = inbound.consume(&payload, None, false).await.unwrap();
    assert_eq!(consumed, None);
    assert_eq!(store.max_assigned_id().await.unwrap(), 0);
}

#[tokio::test]
async fn test_primary_only_round_trip_keeps_highest_priority_item() {
    let scratch = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let inbound = inbound(Arc::clone(&store), &scratch);
    let outbound = OutboundPipeline::new(registry());

    let mut record = PasteRecord::new(1, None, false);
    record.items.push(PasteItem::html("<i>rich</i>"));
    record.items.push(PasteItem::text("plain"));

    let payload = outbound
        .produce(
            &record,
            ProduceOptions {
                primary_only: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(payload.len(), 1);

    let record_id = inbound
        .consume(&payload, None, false)
        .await
        .unwrap()
        .unwrap();
    let stored = store.get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(stored.items.len(), 1);
    assert_eq!(stored.items[0].payload, record.items[0].payload);
}
