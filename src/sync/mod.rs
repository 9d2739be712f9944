//! Sync engine
//!
//! Wires the watcher, pipelines, store and transports together: local
//! clipboard changes become records and fan out to trusted peers;
//! remote records land in the store and get written back to the local
//! clipboard; tombstones propagate and evict cached chunk indexes.

pub mod transport;

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, RuntimeState};
use crate::extract::ExtractorRegistry;
use crate::notify::{Notifier, NotifyKind};
use crate::pipeline::inbound::InboundPipeline;
use crate::pipeline::outbound::{OutboundPipeline, ProduceOptions};
use crate::record::{PasteRecord, RecordId, RecordIdAllocator, RecordOrigin};
use crate::store::RecordStore;
use crate::transfer::{ChunkCacheConfig, FileChunkCache, SyncTracker};
use crate::trust::{TrustRegistry, TrustState};
use crate::watcher::{
    ClipboardWriter, NativeClipboard, OwnershipToken, WatchEvent, Watcher, WatcherConfig,
};
use bytes::Bytes;
use transport::{PeerTransport, TransportError};

/// Concurrent outbound pushes across all peers and records
const MAX_CONCURRENT_PUSHES: usize = 10;

/// Engine lifecycle events, broadcast to any interested observer
/// (status surfaces, tests). Lagging receivers lose old events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A local clipboard change became a stored record
    RecordStored(RecordId),
    /// A record reached every trusted peer
    RecordSynced(RecordId),
    /// A record arrived from a peer and was applied locally
    RemoteApplied(RecordId),
    /// A record was tombstoned, locally or remotely
    RecordTombstoned(RecordId),
}

/// Everything one running PasteSync node needs
pub struct SyncEngine {
    device_id: Uuid,
    inbound: InboundPipeline,
    outbound: OutboundPipeline,
    store: Arc<dyn RecordStore>,
    ids: Arc<RecordIdAllocator>,
    tracker: Arc<SyncTracker>,
    chunk_cache: Arc<FileChunkCache>,
    trust: Arc<TrustRegistry>,
    transports: RwLock<HashMap<Uuid, Arc<dyn PeerTransport>>>,
    watcher: Watcher,
    writer: ClipboardWriter,
    notifier: Arc<dyn Notifier>,
    push_permits: Arc<Semaphore>,
    events: broadcast::Sender<SyncEvent>,
    state_path: std::path::PathBuf,
    listening_enabled: bool,
    legacy_compatibility_mode: bool,
    max_payload_size: usize,
}

impl SyncEngine {
    /// Build an engine from configuration. Seeds the id allocator from
    /// the store so restarts never reuse a record id.
    pub async fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        clipboard: Arc<dyn NativeClipboard>,
        notifier: Arc<dyn Notifier>,
    ) -> crate::Result<Self> {
        let registry = Arc::new(ExtractorRegistry::with_default_extractors());
        let max_assigned = store.max_assigned_id().await?;
        let ids = Arc::new(RecordIdAllocator::new(max_assigned));

        let inbound = InboundPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&ids),
            config.scratch_dir(),
        );
        let outbound = OutboundPipeline::new(Arc::clone(&registry));

        let chunk_cache = Arc::new(FileChunkCache::new(
            Arc::clone(&store),
            ChunkCacheConfig {
                capacity: config.transfer.cache_capacity,
                ttl: Duration::from_secs(config.transfer.cache_ttl_secs),
                chunk_size: config.transfer.chunk_size as u64,
            },
        ));

        let trust = Arc::new(TrustRegistry::new(config.trust_path()));
        if let Err(e) = trust.load().await {
            warn!("Could not load trust registry, starting fresh: {e}");
        }

        let token = OwnershipToken::new();
        let watcher = Watcher::new(
            Arc::clone(&clipboard),
            token.clone(),
            WatcherConfig {
                poll_interval: Duration::from_millis(config.watcher.poll_interval_ms),
                min_source_app_time: Duration::from_millis(config.watcher.min_source_app_time_ms),
                skip_prior_content: config.skip_prior_clipboard_content,
            },
        );
        let writer = ClipboardWriter::spawn(clipboard, token, Arc::clone(&notifier));

        Ok(Self {
            device_id: config.device_id,
            inbound,
            outbound,
            store,
            ids,
            tracker: Arc::new(SyncTracker::new()),
            chunk_cache,
            trust,
            transports: RwLock::new(HashMap::new()),
            watcher,
            writer,
            notifier,
            push_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_PUSHES)),
            events: broadcast::channel(64).0,
            state_path: config.state_path(),
            listening_enabled: config.listening_enabled,
            legacy_compatibility_mode: config.legacy_compatibility_mode,
            max_payload_size: config.watcher.max_payload_size,
        })
    }

    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn trust(&self) -> &Arc<TrustRegistry> {
        &self.trust
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    /// Subscribe to engine lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; events are observability, not control.
        let _ = self.events.send(event);
    }

    /// Register a transport for a peer. Trust state still gates whether
    /// anything flows over it.
    pub async fn add_peer(&self, transport: Arc<dyn PeerTransport>) {
        let id = transport.peer_id();
        info!("Registered transport for peer {} ({id})", transport.peer_name());
        self.transports.write().await.insert(id, transport);
    }

    pub async fn remove_peer(&self, peer_id: Uuid) {
        self.transports.write().await.remove(&peer_id);
    }

    /// Record a peer's trust transition and surface it to the user
    pub async fn set_peer_state(
        &self,
        peer_id: Uuid,
        name: &str,
        state: TrustState,
    ) -> crate::Result<()> {
        let previous = self
            .trust
            .set_state(peer_id, name, state)
            .await
            .map_err(|e| crate::Error::Other(e.to_string()))?;
        if previous != state {
            self.notifier
                .notify(NotifyKind::PeerStatus, &format!("{name} is now {state:?}"));
        }
        Ok(())
    }

    /// Start the clipboard watcher and the event loop that feeds local
    /// changes into the sync pipeline
    pub fn start(self: &Arc<Self>) -> crate::Result<()> {
        if !self.listening_enabled {
            info!("Clipboard listening disabled by configuration");
            return Ok(());
        }

        let state = RuntimeState::load(&self.state_path).unwrap_or_default();
        let mut rx = self.watcher.start(state.last_change_count)?;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = engine.handle_watch_event(event).await {
                    error!("Failed to process clipboard change: {e}");
                }
            }
            debug!("Watch event loop ended");
        });

        Ok(())
    }

    /// Stop the watcher and persist the last-seen change counter so a
    /// restart does not re-ingest the same clipboard state
    pub fn stop(&self) {
        let last = self.watcher.stop();
        let state = RuntimeState {
            last_change_count: last,
        };
        if let Err(e) = state.save(&self.state_path) {
            warn!("Could not persist watcher state: {e}");
        }
    }

    /// One local clipboard change: aggregate into a record, then fan
    /// out to trusted peers
    pub async fn handle_watch_event(self: &Arc<Self>, event: WatchEvent) -> crate::Result<()> {
        if event.payload.total_bytes() > self.max_payload_size {
            warn!(
                "Skipping clipboard change {}: {} bytes exceeds the {} byte limit",
                event.change_id,
                event.payload.total_bytes(),
                self.max_payload_size
            );
            return Ok(());
        }

        let record_id = self
            .inbound
            .consume(&event.payload, event.source_app.as_deref(), false)
            .await?;

        if let Some(record_id) = record_id {
            self.emit(SyncEvent::RecordStored(record_id));
            self.push_to_peers(record_id).await?;
        }
        Ok(())
    }

    /// Push one stored record to every trusted peer with a registered
    /// transport. Each peer is one tracked task; a failed peer leaves
    /// the transfer incomplete rather than failing the others.
    pub async fn push_to_peers(self: &Arc<Self>, record_id: RecordId) -> crate::Result<()> {
        let mut targets = Vec::new();
        for transport in self.transports.read().await.values() {
            if self.trust.can_sync(transport.peer_id()).await {
                targets.push(Arc::clone(transport));
            }
        }
        if targets.is_empty() {
            debug!("No trusted peers for record {record_id}");
            return Ok(());
        }

        let mut record = self
            .store
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| crate::Error::Other(format!("record {record_id} vanished")))?;

        // Stamp the origin identity before the record crosses a device
        // boundary; replicas re-key ids, tombstones resolve through this.
        if record.origin.is_none() {
            record.origin = Some(RecordOrigin {
                device: self.device_id,
                id: record.id,
            });
            self.store.insert_or_update(&record).await?;
        }

        let handle = self.tracker.start_tracking(record_id, targets.len());
        let record = Arc::new(record);

        let mut tasks = Vec::new();
        for (task_index, transport) in targets.into_iter().enumerate() {
            let engine = Arc::clone(self);
            let record = Arc::clone(&record);
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = engine.push_permits.acquire().await;
                match engine.push_record_to(&transport, &record).await {
                    Ok(()) => {
                        handle.mark_task_complete(task_index);
                        if handle.is_complete() {
                            engine.tracker.finish(record.id);
                            engine.emit(SyncEvent::RecordSynced(record.id));
                            engine.notifier.notify(
                                NotifyKind::SyncComplete,
                                &format!("Record {} synced to all peers", record.id),
                            );
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Push of record {} to {} failed: {e}",
                            record.id,
                            transport.peer_name()
                        );
                        engine.notifier.notify(
                            NotifyKind::TransferFailed,
                            &format!("Could not sync to {}: {e}", transport.peer_name()),
                        );
                    }
                }
            }));
        }
        join_all(tasks).await;
        Ok(())
    }

    /// Record first, then chunks: the peer can show the record and its
    /// progress while file bytes are still in flight.
    async fn push_record_to(
        &self,
        transport: &Arc<dyn PeerTransport>,
        record: &PasteRecord,
    ) -> Result<(), TransportError> {
        transport.push_record(record).await?;

        if !record.has_file_items() {
            return Ok(());
        }
        let Some(index) = self
            .chunk_cache
            .files_index(transport.peer_id(), record.id)
            .await
        else {
            debug!("Record {} has no readable file chunks", record.id);
            return Ok(());
        };
        for chunk_index in 0..index.chunk_count() {
            let data = index.read_chunk(chunk_index)?;
            transport.push_chunk(record.id, chunk_index, data).await?;
        }
        Ok(())
    }

    /// Apply a record received from a peer: re-key it into the local id
    /// space, persist it, and write the rendered payload back to the
    /// local clipboard with the local-only marker so the watcher does
    /// not echo it. The origin identity stamped by the sender is kept
    /// so a later tombstone finds this replica.
    pub async fn apply_remote(&self, mut record: PasteRecord) -> crate::Result<RecordId> {
        if let Some(origin) = record.origin {
            if let Some(existing) = self
                .store
                .find_by_origin(origin.device, origin.id)
                .await?
            {
                debug!(
                    "Record {}#{} already applied as {}, skipping",
                    origin.device, origin.id, existing.id
                );
                return Ok(existing.id);
            }
        }
        record.id = self.ids.next_id();
        record.remote = true;
        self.store.insert_or_update(&record).await?;

        let payload = self.outbound.produce(
            &record,
            ProduceOptions {
                local_only: true,
                filter_file_types: true,
                primary_only: self.legacy_compatibility_mode,
            },
        );
        match payload {
            Some(payload) => self.writer.write(payload).await?,
            None => debug!(
                "Remote record {} has no locally renderable item",
                record.id
            ),
        }
        self.emit(SyncEvent::RemoteApplied(record.id));
        Ok(record.id)
    }

    /// Tombstone a local record and tell every trusted peer.
    ///
    /// The tombstone names the record by its origin identity, never by
    /// this device's id, so peers resolve it to their own replica.
    pub async fn delete_record(&self, record_id: RecordId) -> crate::Result<()> {
        let record = self
            .store
            .get_by_id(record_id)
            .await?
            .ok_or(crate::store::StoreError::NotFound(record_id))?;
        self.tombstone_local(record_id).await?;

        let (origin_device, origin_id) = match record.origin {
            Some(origin) => (origin.device, origin.id),
            None => (self.device_id, record_id),
        };
        for transport in self.transports.read().await.values() {
            if !self.trust.can_sync(transport.peer_id()).await {
                continue;
            }
            if let Err(e) = transport.push_tombstone(origin_device, origin_id).await {
                warn!(
                    "Tombstone of record {record_id} to {} failed: {e}",
                    transport.peer_name()
                );
            }
        }
        Ok(())
    }

    /// Apply a tombstone announced by a peer. The record is named by
    /// its origin identity; an unknown record is a no-op, never a
    /// guess at a local id.
    pub async fn apply_remote_tombstone(
        &self,
        origin_device: Uuid,
        origin_id: RecordId,
    ) -> crate::Result<()> {
        if origin_device == self.device_id {
            return self.tombstone_local(origin_id).await;
        }
        match self.store.find_by_origin(origin_device, origin_id).await? {
            Some(replica) => self.tombstone_local(replica.id).await,
            None => {
                debug!("No local replica of {origin_device}#{origin_id}, ignoring tombstone");
                Ok(())
            }
        }
    }

    async fn tombstone_local(&self, record_id: RecordId) -> crate::Result<()> {
        self.store.mark_tombstoned(record_id).await?;
        // Evict immediately; serving chunks of a deleted record to a
        // newly asking peer would resurrect it.
        self.chunk_cache.purge_record(record_id).await;
        self.emit(SyncEvent::RecordTombstoned(record_id));
        Ok(())
    }

    /// Serve one chunk of a local record to an asking peer
    pub async fn serve_chunk(
        &self,
        peer: Uuid,
        record_id: RecordId,
        chunk_index: usize,
    ) -> crate::Result<Bytes> {
        if !self.trust.can_sync(peer).await {
            return Err(crate::Error::Other(format!("peer {peer} is not trusted")));
        }
        let index = self
            .chunk_cache
            .files_index(peer, record_id)
            .await
            .ok_or_else(|| crate::Error::Other(format!("no chunks for record {record_id}")))?;
        Ok(index.read_chunk(chunk_index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::RecordingNotifier;
    use crate::payload::NativePayload;
    use crate::record::PasteItem;
    use crate::store::MemoryRecordStore;
    use crate::watcher::WatchError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use transport::LoopbackTransport;

    struct FakeClipboard {
        counter: AtomicU64,
        content: StdMutex<NativePayload>,
    }

    impl FakeClipboard {
        fn new() -> Self {
            Self {
                counter: AtomicU64::new(1),
                content: StdMutex::new(NativePayload::new()),
            }
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

    async fn engine_with(
        dir: &TempDir,
        clipboard: Arc<FakeClipboard>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<SyncEngine> {
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        Arc::new(
            SyncEngine::new(&config, store, clipboard, notifier)
                .await
                .unwrap(),
        )
    }

    fn text_event(text: &str) -> WatchEvent {
        let mut payload = NativePayload::new();
        payload.push("text/plain", text.as_bytes().to_vec());
        WatchEvent {
            payload,
            source_app: Some("test-app".to_string()),
            change_id: 1,
        }
    }

    #[tokio::test]
    async fn test_local_change_reaches_trusted_peer() {
        let dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = engine_with(&dir, Arc::new(FakeClipboard::new()), notifier.clone()).await;

        let peer = Arc::new(LoopbackTransport::new("laptop"));
        engine
            .trust()
            .set_state(peer.peer_id(), "laptop", TrustState::Connected)
            .await
            .unwrap();
        engine.add_peer(peer.clone()).await;

        engine.handle_watch_event(text_event("hello")).await.unwrap();

        let received = peer.received_records().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].items.len(), 1);
        assert!(!received[0].remote);
        // Origin identity was stamped before the record left the device.
        assert_eq!(
            received[0].origin,
            Some(RecordOrigin {
                device: engine.device_id(),
                id: received[0].id
            })
        );

        // Delivery completed, so the tracker forgot the record.
        assert_eq!(engine.tracker().current_progress(received[0].id), None);
        assert!(notifier
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|(kind, _)| *kind == NotifyKind::SyncComplete));
    }

    #[tokio::test]
    async fn test_untrusted_peer_receives_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        let peer = Arc::new(LoopbackTransport::new("stranger"));
        engine.add_peer(peer.clone()).await;

        engine.handle_watch_event(text_event("secret")).await.unwrap();

        assert!(peer.received_records().await.is_empty());
        // The record itself still landed in the local store.
        assert_eq!(engine.store().recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_remote_stores_and_writes_clipboard() {
        let dir = TempDir::new().unwrap();
        let clipboard = Arc::new(FakeClipboard::new());
        let engine = engine_with(&dir, clipboard.clone(), Arc::new(RecordingNotifier::default()))
            .await;

        let mut record = PasteRecord::new(999, Some("remote-app".into()), false);
        record.items.push(PasteItem::text("from the other side"));

        let local_id = engine.apply_remote(record).await.unwrap();
        assert_ne!(local_id, 999);

        let stored = engine.store().get_by_id(local_id).await.unwrap().unwrap();
        assert!(stored.remote);

        // The writer task applies asynchronously.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let applied = clipboard.current();
        assert!(applied.has_local_only_marker());
        assert_eq!(
            applied.get(&"text/plain".into()).unwrap().as_ref(),
            b"from the other side"
        );
    }

    #[tokio::test]
    async fn test_delete_record_broadcasts_tombstone() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        let peer = Arc::new(LoopbackTransport::new("laptop"));
        engine
            .trust()
            .set_state(peer.peer_id(), "laptop", TrustState::Connected)
            .await
            .unwrap();
        engine.add_peer(peer.clone()).await;

        engine.handle_watch_event(text_event("ephemeral")).await.unwrap();
        let record_id = peer.received_records().await[0].id;

        engine.delete_record(record_id).await.unwrap();

        assert_eq!(
            peer.received_tombstones().await,
            vec![(engine.device_id(), record_id)]
        );
        let stored = engine.store().get_by_id(record_id).await.unwrap().unwrap();
        assert!(stored.tombstoned);
    }

    #[tokio::test]
    async fn test_events_broadcast_store_and_sync() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        let peer = Arc::new(LoopbackTransport::new("laptop"));
        engine
            .trust()
            .set_state(peer.peer_id(), "laptop", TrustState::Connected)
            .await
            .unwrap();
        engine.add_peer(peer.clone()).await;

        let mut events = engine.subscribe();
        engine.handle_watch_event(text_event("watched")).await.unwrap();

        let stored = events.recv().await.unwrap();
        assert!(matches!(stored, SyncEvent::RecordStored(_)));
        let synced = events.recv().await.unwrap();
        assert!(matches!(synced, SyncEvent::RecordSynced(_)));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_dropped() {
        let dir = TempDir::new().unwrap();
        let clipboard = Arc::new(FakeClipboard::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.watcher.max_payload_size = 16 * 1024;
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let engine = Arc::new(
            SyncEngine::new(&config, store, clipboard, notifier)
                .await
                .unwrap(),
        );

        let huge = "x".repeat(32 * 1024);
        engine.handle_watch_event(text_event(&huge)).await.unwrap();

        assert_eq!(engine.store().max_assigned_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remote_tombstone_resolves_through_origin() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        // A private local record claims the low id first.
        engine.handle_watch_event(text_event("private")).await.unwrap();
        let private_id = engine.store().max_assigned_id().await.unwrap();

        // A record captured on another device arrives carrying its
        // origin identity, and gets re-keyed locally.
        let origin_device = Uuid::new_v4();
        let mut incoming = PasteRecord::new(private_id, Some("peer-app".into()), false);
        incoming.origin = Some(RecordOrigin {
            device: origin_device,
            id: private_id,
        });
        incoming.items.push(PasteItem::text("replicated"));
        let replica_id = engine.apply_remote(incoming).await.unwrap();
        assert_ne!(replica_id, private_id);

        // The origin deletes its record; only the replica dies.
        engine
            .apply_remote_tombstone(origin_device, private_id)
            .await
            .unwrap();

        let replica = engine.store().get_by_id(replica_id).await.unwrap().unwrap();
        assert!(replica.tombstoned);
        let private = engine.store().get_by_id(private_id).await.unwrap().unwrap();
        assert!(!private.tombstoned);
    }

    #[tokio::test]
    async fn test_tombstone_for_unknown_origin_is_ignored() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        engine.handle_watch_event(text_event("keep me")).await.unwrap();
        let id = engine.store().max_assigned_id().await.unwrap();

        engine
            .apply_remote_tombstone(Uuid::new_v4(), id)
            .await
            .unwrap();
        let record = engine.store().get_by_id(id).await.unwrap().unwrap();
        assert!(!record.tombstoned);
    }

    #[tokio::test]
    async fn test_peer_state_change_notifies() {
        let dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = engine_with(&dir, Arc::new(FakeClipboard::new()), notifier.clone()).await;

        let peer = Uuid::new_v4();
        engine
            .set_peer_state(peer, "laptop", TrustState::Connected)
            .await
            .unwrap();
        // Re-asserting the same state is not a transition.
        engine
            .set_peer_state(peer, "laptop", TrustState::Connected)
            .await
            .unwrap();
        engine
            .set_peer_state(peer, "laptop", TrustState::Disconnected)
            .await
            .unwrap();

        let events = notifier.events.lock().unwrap();
        let status: Vec<_> = events
            .iter()
            .filter(|(kind, _)| *kind == NotifyKind::PeerStatus)
            .collect();
        assert_eq!(status.len(), 2);
        assert!(status[0].1.contains("Connected"));
        assert!(status[1].1.contains("Disconnected"));
    }

    #[tokio::test]
    async fn test_serve_chunk_requires_trust() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(
            &dir,
            Arc::new(FakeClipboard::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .await;

        let result = engine.serve_chunk(Uuid::new_v4(), 1, 0).await;
        assert!(result.is_err());
    }
}
