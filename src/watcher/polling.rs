//! Portable polling backend
//!
//! Fallback for platforms without a usable native change signal. The
//! change counter is derived from a content hash, so polling the
//! counter is as expensive as a read; the interval in
//! [`super::WatcherConfig`] bounds the cost.

use arboard::Clipboard;
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use super::{NativeClipboard, WatchError};
use crate::extract::markup::TEXT_HTML;
use crate::extract::text::TEXT_PLAIN;
use crate::payload::NativePayload;

/// arboard-backed clipboard, text and HTML representations only
pub struct PollingClipboard {
    clipboard: Mutex<Clipboard>,
}

impl PollingClipboard {
    pub fn new() -> Result<Self, WatchError> {
        let clipboard = Clipboard::new()
            .map_err(|e| WatchError::Init(format!("Failed to open clipboard: {e}")))?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }

    fn read_text(&self) -> Option<String> {
        self.clipboard.lock().unwrap().get_text().ok()
    }
}

impl NativeClipboard for PollingClipboard {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn change_count(&self) -> Result<u64, WatchError> {
        // Derived counter: hash of the current text content.
        let digest = match self.read_text() {
            Some(text) => Sha256::digest(text.as_bytes()),
            None => Sha256::digest(b""),
        };
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Ok(u64::from_be_bytes(prefix))
    }

    fn snapshot(&self) -> Result<NativePayload, WatchError> {
        let mut payload = NativePayload::new();
        if let Some(text) = self.read_text() {
            if !text.is_empty() {
                payload.push(TEXT_PLAIN, text.into_bytes());
            }
        }
        Ok(payload)
    }

    fn apply(&self, payload: &NativePayload) -> Result<(), WatchError> {
        let mut clipboard = self.clipboard.lock().unwrap();

        let text = payload
            .get(&TEXT_PLAIN.into())
            .and_then(|data| std::str::from_utf8(data).ok().map(str::to_string));
        let html = payload
            .get(&TEXT_HTML.into())
            .and_then(|data| std::str::from_utf8(data).ok().map(str::to_string));

        match (html, text) {
            (Some(html), text) => clipboard
                .set_html(html, text)
                .map_err(|e| WatchError::Platform(format!("Failed to write clipboard: {e}"))),
            (None, Some(text)) => clipboard
                .set_text(text)
                .map_err(|e| WatchError::Platform(format!("Failed to write clipboard: {e}"))),
            (None, None) => Err(WatchError::Platform(
                "No representation this backend can write".into(),
            )),
        }
    }
}
