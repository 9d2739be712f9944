//! Platform clipboard watchers
//!
//! One watcher per OS mechanism (NSPasteboard change count, X11
//! selection, portable polling), all sharing one core loop: detect a
//! distinct change, capture the source application, fetch the payload
//! with backoff, dedupe against the last-seen state, suppress our own
//! writes, and hand the payload off without blocking the detection
//! loop. Write-backs go through a single-consumer queue so two writes
//! can never race for clipboard ownership.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::notify::{Notifier, NotifyKind};
use crate::payload::NativePayload;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

pub mod polling;

/// Watcher errors
#[derive(Debug, Error)]
pub enum WatchError {
    /// Fatal startup failure (missing OS extension, no display); must
    /// surface to the caller
    #[error("Watcher initialization failed: {0}")]
    Init(String),

    /// Platform-specific runtime error; the loop logs and continues
    #[error("Platform error: {0}")]
    Platform(String),

    /// Clipboard stayed empty or invalid through the whole retry window
    #[error("Clipboard content unavailable after retries")]
    Unavailable,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Watcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Running,
}

/// Blocking access to one native clipboard mechanism.
///
/// All methods are blocking OS calls; the watcher invokes them from its
/// own task, never from the caller's thread.
pub trait NativeClipboard: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Cheap change signal. Backends without a native counter derive
    /// one from a content hash.
    fn change_count(&self) -> Result<u64, WatchError>;

    /// Full snapshot of the current clipboard representations. May
    /// transiently return an empty payload right after a change
    /// notification; callers retry with backoff.
    fn snapshot(&self) -> Result<NativePayload, WatchError>;

    /// Write a payload, replacing the clipboard contents
    fn apply(&self, payload: &NativePayload) -> Result<(), WatchError>;

    /// Name of the application currently owning the clipboard, when the
    /// platform exposes it
    fn source_app(&self) -> Option<String> {
        None
    }
}

/// Ownership token exchanged between the outbound writer and the
/// watcher: "I just wrote payload X, ignore the next notification that
/// reports X." Explicit message passing instead of a shared boolean
/// mutated from two threads.
///
/// A write arms two fingerprints: the outgoing payload before `apply`
/// and the observed snapshot after, since backends may not round-trip
/// every representation byte-for-byte. Matching either consumes the
/// whole token.
#[derive(Clone, Default)]
pub struct OwnershipToken {
    expected: Arc<StdMutex<Vec<String>>>,
}

/// Fingerprints kept armed at once; older ones are shed first
const TOKEN_CAPACITY: usize = 4;

impl OwnershipToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the token with a fingerprint a notification for our own
    /// write may report
    pub fn arm(&self, fingerprint: String) {
        let mut expected = self.expected.lock().unwrap();
        expected.push(fingerprint);
        if expected.len() > TOKEN_CAPACITY {
            let excess = expected.len() - TOKEN_CAPACITY;
            expected.drain(..excess);
        }
    }

    /// Consume the token if the observed fingerprint matches any armed
    /// one
    pub fn take_if_matches(&self, fingerprint: &str) -> bool {
        let mut expected = self.expected.lock().unwrap();
        if expected.iter().any(|f| f == fingerprint) {
            expected.clear();
            true
        } else {
            false
        }
    }
}

/// One observed clipboard change
#[derive(Debug)]
pub struct WatchEvent {
    pub payload: NativePayload,
    pub source_app: Option<String>,
    pub change_id: u64,
}

/// Watcher tuning
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Change-detection poll interval
    pub poll_interval: Duration,
    /// Minimum wall time for the source-app read; a too-fast read races
    /// the OS's own app-switch bookkeeping
    pub min_source_app_time: Duration,
    /// Do not ingest clipboard state that predates this start
    pub skip_prior_content: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            min_source_app_time: Duration::from_millis(50),
            skip_prior_content: true,
        }
    }
}

/// Platform-independent watcher driving one [`NativeClipboard`]
pub struct Watcher {
    clipboard: Arc<dyn NativeClipboard>,
    token: OwnershipToken,
    config: WatcherConfig,
    state: Arc<StdMutex<WatcherState>>,
    last_change: Arc<StdMutex<Option<u64>>>,
    shutdown: StdMutex<Option<oneshot::Sender<()>>>,
}

impl Watcher {
    pub fn new(
        clipboard: Arc<dyn NativeClipboard>,
        token: OwnershipToken,
        config: WatcherConfig,
    ) -> Self {
        Self {
            clipboard,
            token,
            config,
            state: Arc::new(StdMutex::new(WatcherState::Stopped)),
            last_change: Arc::new(StdMutex::new(None)),
            shutdown: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock().unwrap()
    }

    /// Start the detection loop.
    ///
    /// `persisted_change_count` is the counter saved by the previous
    /// [`Watcher::stop`]; with `skip_prior_content` it prevents a
    /// restart from reprocessing the same clipboard state. A fatal
    /// init failure (backend unreachable) is returned to the caller.
    pub fn start(
        &self,
        persisted_change_count: Option<u64>,
    ) -> Result<mpsc::Receiver<WatchEvent>, WatchError> {
        // Probe the backend once so broken setups fail at startup
        // instead of silently looping.
        let initial = self
            .clipboard
            .change_count()
            .map_err(|e| WatchError::Init(format!("{} backend unusable: {e}", self.clipboard.name())))?;

        let last_seen = if self.config.skip_prior_content {
            Some(persisted_change_count.unwrap_or(initial))
        } else {
            None
        };

        let (tx, rx) = mpsc::channel(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);
        *self.state.lock().unwrap() = WatcherState::Running;
        *self.last_change.lock().unwrap() = last_seen;

        let clipboard = Arc::clone(&self.clipboard);
        let token = self.token.clone();
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let last_change = Arc::clone(&self.last_change);

        info!(
            "Starting {} watcher (skip_prior={}, last_seen={:?})",
            clipboard.name(),
            config.skip_prior_content,
            last_seen
        );

        tokio::spawn(async move {
            let mut ticker = interval(config.poll_interval);
            let mut last_seen = last_seen;
            let mut last_fingerprint: Option<String> = None;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                let change_id = match clipboard.change_count() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!("Change detection failed: {e}");
                        continue;
                    }
                };
                if last_seen == Some(change_id) {
                    continue;
                }
                // Mark before the fetch so a persistently broken payload
                // cannot hot-loop on the same change.
                last_seen = Some(change_id);
                *last_change.lock().unwrap() = last_seen;

                let source_app =
                    capture_source_app(clipboard.as_ref(), config.min_source_app_time).await;

                let payload = match fetch_with_backoff(clipboard.as_ref()).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Payload fetch failed for change {change_id}: {e}");
                        continue;
                    }
                };

                let fingerprint = payload.fingerprint();
                if last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                    debug!("Change {change_id} matches last-seen payload, skipping");
                    continue;
                }
                last_fingerprint = Some(fingerprint.clone());

                if token.take_if_matches(&fingerprint) || payload.has_local_only_marker() {
                    debug!("Change {change_id} is our own write, skipping");
                    continue;
                }

                let event = WatchEvent {
                    payload,
                    source_app,
                    change_id,
                };
                // Dispatch is async; a slow consumer backpressures here
                // without stalling the OS notification source.
                if tx.send(event).await.is_err() {
                    debug!("Watch consumer dropped, stopping loop");
                    break;
                }
            }

            *state.lock().unwrap() = WatcherState::Stopped;
        });

        Ok(rx)
    }

    /// Stop the detection loop. Returns the last-seen change counter so
    /// the caller can persist it; in-flight aggregation already
    /// dispatched is allowed to finish independently.
    pub fn stop(&self) -> Option<u64> {
        if let Some(shutdown) = self.shutdown.lock().unwrap().take() {
            let _ = shutdown.send(());
        }
        *self.state.lock().unwrap() = WatcherState::Stopped;
        *self.last_change.lock().unwrap()
    }
}

/// Read the source application name, padding the read out to a minimum
/// wall time so it cannot race the OS's app-switch bookkeeping.
async fn capture_source_app(clipboard: &dyn NativeClipboard, min_time: Duration) -> Option<String> {
    let started = Instant::now();
    let first = clipboard.source_app();
    let elapsed = started.elapsed();
    if elapsed < min_time {
        tokio::time::sleep(min_time - elapsed).await;
        return clipboard.source_app().or(first);
    }
    first
}

/// Fetch the payload with exponential backoff: some clipboard APIs
/// transiently report empty contents right after a change notification.
async fn fetch_with_backoff(clipboard: &dyn NativeClipboard) -> Result<NativePayload, WatchError> {
    const INITIAL: Duration = Duration::from_millis(20);
    const CAP: Duration = Duration::from_millis(1000);

    let mut delay = INITIAL;
    loop {
        match clipboard.snapshot() {
            Ok(payload) if !payload.is_empty() => return Ok(payload),
            Ok(_) => {
                if delay >= CAP {
                    return Err(WatchError::Unavailable);
                }
            }
            Err(e) => {
                if delay >= CAP {
                    return Err(e);
                }
                debug!("Snapshot failed, retrying in {:?}: {e}", delay);
            }
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(CAP);
    }
}

/// Serialized write-back queue. One consumer task applies payloads in
/// order and arms the ownership token with the fingerprint the watcher
/// will observe for each write.
#[derive(Clone)]
pub struct ClipboardWriter {
    tx: mpsc::Sender<NativePayload>,
}

impl ClipboardWriter {
    pub fn spawn(
        clipboard: Arc<dyn NativeClipboard>,
        token: OwnershipToken,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<NativePayload>(32);

        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                // Arm before the write lands: a watcher tick can fire in
                // the gap between apply and the post-apply snapshot.
                token.arm(payload.fingerprint());
                if let Err(e) = clipboard.apply(&payload) {
                    error!("Clipboard write-back failed: {e}");
                    notifier.notify(
                        NotifyKind::ClipboardAccess,
                        &format!("Failed to write clipboard: {e}"),
                    );
                    continue;
                }
                // Re-arm with what the clipboard actually reports, since
                // backends may drop representations they cannot store.
                if let Ok(observed) = clipboard.snapshot() {
                    token.arm(observed.fingerprint());
                }
            }
        });

        Self { tx }
    }

    /// Queue one payload for write-back
    pub async fn write(&self, payload: NativePayload) -> Result<(), WatchError> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| WatchError::Platform("write-back queue closed".into()))
    }
}

/// Pick the native clipboard mechanism for the current platform
pub fn create_native_clipboard() -> Result<Arc<dyn NativeClipboard>, WatchError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::PasteboardClipboard::new()?))
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if std::env::var("WAYLAND_DISPLAY").is_err() && std::env::var("DISPLAY").is_ok() {
            match x11::X11SelectionClipboard::new() {
                Ok(clipboard) => return Ok(Arc::new(clipboard)),
                Err(e) => warn!("X11 backend unavailable, falling back to polling: {e}"),
            }
        }
        Ok(Arc::new(polling::PollingClipboard::new()?))
    }

    #[cfg(not(unix))]
    {
        Ok(Arc::new(polling::PollingClipboard::new()?))
    }
}
