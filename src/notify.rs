//! User-facing notification sink
//!
//! Fire-and-forget: failures to notify never propagate into the
//! pipeline. The default sink writes structured log events; a desktop
//! frontend can supply its own implementation.

use tracing::{info, warn};

/// Category of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    /// Clipboard read or write failed
    ClipboardAccess,
    /// A peer changed trust state
    PeerStatus,
    /// A record finished syncing to all peers
    SyncComplete,
    /// A file transfer could not complete
    TransferFailed,
}

/// Notification sink. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotifyKind, message: &str);
}

/// Default sink that routes notifications into the log stream
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotifyKind, message: &str) {
        match kind {
            NotifyKind::ClipboardAccess | NotifyKind::TransferFailed => {
                warn!(?kind, "{message}");
            }
            NotifyKind::PeerStatus | NotifyKind::SyncComplete => {
                info!(?kind, "{message}");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records notifications for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<(NotifyKind, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NotifyKind, message: &str) {
            self.events.lock().unwrap().push((kind, message.to_string()));
        }
    }
}
