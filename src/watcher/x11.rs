//! X11 selection backend
//!
//! Reads the CLIPBOARD selection through the X11 selection-conversion
//! protocol. Change detection is event-driven: a dedicated connection
//! blocks in `load_wait`, which returns on each SelectionNotify for a
//! new owner, and bumps a counter the watcher polls cheaply. The poll
//! itself never transfers selection contents.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use x11_clipboard::Clipboard as X11ClipboardLib;

use super::{NativeClipboard, WatchError};
use crate::extract::text::TEXT_PLAIN;
use crate::payload::NativePayload;

const SELECTION_TIMEOUT: Duration = Duration::from_millis(500);

/// X11 selection-based clipboard
pub struct X11SelectionClipboard {
    clipboard: Arc<X11ClipboardLib>,
    changes: Arc<AtomicU64>,
}

impl X11SelectionClipboard {
    pub fn new() -> Result<Self, WatchError> {
        let clipboard = X11ClipboardLib::new()
            .map_err(|e| WatchError::Init(format!("Failed to connect to X11: {e}")))?;
        // Separate connection for the blocking listener so it cannot
        // interleave with reads and writes on the main one.
        let listener = X11ClipboardLib::new()
            .map_err(|e| WatchError::Init(format!("Failed to open listener connection: {e}")))?;

        let changes = Arc::new(AtomicU64::new(1));
        let counter = Arc::clone(&changes);
        std::thread::Builder::new()
            .name("x11-selection-listener".into())
            .spawn(move || loop {
                match listener.load_wait(
                    listener.getter.atoms.clipboard,
                    listener.getter.atoms.utf8_string,
                    listener.getter.atoms.property,
                ) {
                    Ok(_) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        debug!("X11 selection owner changed");
                    }
                    Err(e) => {
                        warn!("X11 selection wait failed, retrying: {e}");
                        std::thread::sleep(Duration::from_secs(1));
                    }
                }
            })?;

        Ok(Self {
            clipboard: Arc::new(clipboard),
            changes,
        })
    }

    fn read_clipboard_selection(&self) -> Result<Vec<u8>, WatchError> {
        self.clipboard
            .load(
                self.clipboard.setter.atoms.clipboard,
                self.clipboard.setter.atoms.utf8_string,
                self.clipboard.setter.atoms.property,
                SELECTION_TIMEOUT,
            )
            .map_err(|e| WatchError::Platform(format!("Failed to read selection: {e}")))
    }
}

impl NativeClipboard for X11SelectionClipboard {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn change_count(&self) -> Result<u64, WatchError> {
        Ok(self.changes.load(Ordering::SeqCst))
    }

    fn snapshot(&self) -> Result<NativePayload, WatchError> {
        let data = self.read_clipboard_selection()?;
        let mut payload = NativePayload::new();
        if !data.is_empty() {
            payload.push("UTF8_STRING", data);
        }
        Ok(payload)
    }

    fn apply(&self, payload: &NativePayload) -> Result<(), WatchError> {
        let data = payload
            .get(&"UTF8_STRING".into())
            .or_else(|| payload.get(&TEXT_PLAIN.into()))
            .ok_or_else(|| {
                WatchError::Platform("No representation this backend can write".into())
            })?;

        self.clipboard
            .store(
                self.clipboard.setter.atoms.clipboard,
                self.clipboard.setter.atoms.utf8_string,
                data.as_ref(),
            )
            .map_err(|e| WatchError::Platform(format!("Failed to write selection: {e}")))
    }
}

// The underlying X connection handles are used from one watcher task at
// a time.
unsafe impl Send for X11SelectionClipboard {}
unsafe impl Sync for X11SelectionClipboard {}
