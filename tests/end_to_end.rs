//! Two-device flow: a clipboard change on device A lands on device B's
//! clipboard, and a restart picks up where the store left off.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pastesync::config::Config;
use pastesync::notify::LogNotifier;
use pastesync::payload::NativePayload;
use pastesync::store::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use pastesync::sync::transport::{LoopbackTransport, PeerTransport};
use pastesync::sync::SyncEngine;
use pastesync::trust::TrustState;
use pastesync::watcher::{NativeClipboard, WatchError, WatchEvent};
use tempfile::TempDir;

/// In-memory clipboard standing in for the OS
struct FakeClipboard {
    counter: AtomicU64,
    content: Mutex<NativePayload>,
}

impl FakeClipboard {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicU64::new(1),
            content: Mutex::new(NativePayload::new()),
        })
    }

    fn current(&self) -> NativePayload {
        self.content.lock().unwrap().clone()
    }
}

impl NativeClipboard for FakeClipboard {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn change_count(&self) -> Result<u64, WatchError> {
        Ok(self.counter.load(Ordering::SeqCst))
    }

    fn snapshot(&self) -> Result<NativePayload, WatchError> {
        Ok(self.current())
    }

    fn apply(&self, payload: &NativePayload) -> Result<(), WatchError> {
        *self.content.lock().unwrap() = payload.clone();
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn engine(dir: &TempDir, clipboard: Arc<FakeClipboard>) -> Arc<SyncEngine> {
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    Arc::new(
        SyncEngine::new(&config, store, clipboard, Arc::new(LogNotifier))
            .await
            .unwrap(),
    )
}

fn text_event(text: &str) -> WatchEvent {
    let mut payload = NativePayload::new();
    payload.push("text/plain", text.as_bytes().to_vec());
    WatchEvent {
        payload,
        source_app: Some("editor".to_string()),
        change_id: 1,
    }
}

#[tokio::test]
async fn test_copy_on_a_appears_on_b() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let clipboard_b = FakeClipboard::new();

    let engine_a = engine(&dir_a, FakeClipboard::new()).await;
    let engine_b = engine(&dir_b, clipboard_b.clone()).await;

    // A trusts the loopback peer standing in for B's transport.
    let wire = Arc::new(LoopbackTransport::new("device-b"));
    engine_a
        .trust()
        .set_state(wire.peer_id(), "device-b", TrustState::Connected)
        .await
        .unwrap();
    engine_a.add_peer(wire.clone()).await;

    engine_a
        .handle_watch_event(text_event("shared text"))
        .await
        .unwrap();

    // Deliver what crossed the wire to B, as B's transport layer would.
    let records = wire.received_records().await;
    assert_eq!(records.len(), 1);
    let local_id = engine_b.apply_remote(records[0].clone()).await.unwrap();

    let stored = engine_b.store().get_by_id(local_id).await.unwrap().unwrap();
    assert!(stored.remote);
    assert_eq!(stored.items.len(), 1);

    // B's writer task applies asynchronously.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let applied = clipboard_b.current();
    assert!(applied.has_local_only_marker());
    assert_eq!(
        applied.get(&"text/plain".into()).unwrap().as_ref(),
        b"shared text"
    );

    // B's own pipeline ignores the marked payload, so no echo record.
    let echoed = engine_b
        .handle_watch_event(WatchEvent {
            payload: applied,
            source_app: None,
            change_id: 2,
        })
        .await;
    assert!(echoed.is_ok());
    assert_eq!(engine_b.store().recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_on_a_tombstones_only_the_replica_on_b() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    let engine_a = engine(&dir_a, FakeClipboard::new()).await;
    let engine_b = engine(&dir_b, FakeClipboard::new()).await;

    // B has its own private record occupying the low end of its id
    // space before anything arrives from A.
    engine_b
        .handle_watch_event(text_event("b private"))
        .await
        .unwrap();
    let private_id = engine_b.store().max_assigned_id().await.unwrap();

    let wire = Arc::new(LoopbackTransport::new("device-b"));
    engine_a
        .trust()
        .set_state(wire.peer_id(), "device-b", TrustState::Connected)
        .await
        .unwrap();
    engine_a.add_peer(wire.clone()).await;

    engine_a
        .handle_watch_event(text_event("shared then deleted"))
        .await
        .unwrap();
    let pushed = wire.received_records().await;
    let a_side_id = pushed[0].id;
    let replica_id = engine_b.apply_remote(pushed[0].clone()).await.unwrap();

    // A deletes; the tombstone crosses the wire as the origin identity.
    engine_a.delete_record(a_side_id).await.unwrap();
    let tombstones = wire.received_tombstones().await;
    assert_eq!(tombstones, vec![(engine_a.device_id(), a_side_id)]);
    engine_b
        .apply_remote_tombstone(tombstones[0].0, tombstones[0].1)
        .await
        .unwrap();

    let replica = engine_b
        .store()
        .get_by_id(replica_id)
        .await
        .unwrap()
        .unwrap();
    assert!(replica.tombstoned);

    // B's private record shares A's numeric id but is untouched.
    let private = engine_b
        .store()
        .get_by_id(private_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!private.tombstoned);
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("records.db");

    {
        let store = SqliteRecordStore::new(&db_path).await.unwrap();
        let mut record = pastesync::record::PasteRecord::new(5, None, false);
        record.items.push(pastesync::record::PasteItem::text("kept"));
        store.insert_or_update(&record).await.unwrap();
    }

    let reopened = SqliteRecordStore::new(&db_path).await.unwrap();
    assert_eq!(reopened.max_assigned_id().await.unwrap(), 5);
    let record = reopened.get_by_id(5).await.unwrap().unwrap();
    assert_eq!(record.items.len(), 1);
}
