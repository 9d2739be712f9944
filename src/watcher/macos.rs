//! macOS NSPasteboard backend
//!
//! The only platform with a true native change counter: NSPasteboard's
//! changeCount increments on every ownership change, so detection never
//! has to read content.

use cocoa::base::{id, nil};
use cocoa::foundation::{NSArray, NSAutoreleasePool, NSString};
use objc::{class, msg_send, sel, sel_impl};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Mutex;

use super::{NativeClipboard, WatchError};
use crate::extract::text::TEXT_PLAIN;
use crate::payload::NativePayload;

const NS_PASTEBOARD_TYPE_STRING: &str = "public.utf8-plain-text";
const NS_PASTEBOARD_TYPE_RTF: &str = "public.rtf";

/// NSPasteboard-backed clipboard
pub struct PasteboardClipboard {
    pasteboard: Mutex<id>,
}

impl PasteboardClipboard {
    pub fn new() -> Result<Self, WatchError> {
        unsafe {
            let pasteboard: id = msg_send![class!(NSPasteboard), generalPasteboard];
            if pasteboard == nil {
                return Err(WatchError::Init(
                    "Failed to get general pasteboard".to_string(),
                ));
            }
            Ok(Self {
                pasteboard: Mutex::new(pasteboard),
            })
        }
    }

    unsafe fn type_string(type_str: &str) -> id {
        NSString::alloc(nil).init_str(type_str)
    }

    unsafe fn read_string_type(pasteboard: id, type_str: &str) -> Option<String> {
        let pool = NSAutoreleasePool::new(nil);

        let pb_type = Self::type_string(type_str);
        let types = NSArray::arrayWithObject(nil, pb_type);
        let available: id = msg_send![pasteboard, availableTypeFromArray: types];
        if available == nil {
            let _: () = msg_send![pool, drain];
            return None;
        }

        let value: id = msg_send![pasteboard, stringForType: pb_type];
        if value == nil {
            let _: () = msg_send![pool, drain];
            return None;
        }

        let utf8_ptr: *const c_char = msg_send![value, UTF8String];
        if utf8_ptr.is_null() {
            let _: () = msg_send![pool, drain];
            return None;
        }
        let result = CStr::from_ptr(utf8_ptr).to_string_lossy().into_owned();

        let _: () = msg_send![pool, drain];
        Some(result)
    }
}

impl NativeClipboard for PasteboardClipboard {
    fn name(&self) -> &'static str {
        "nspasteboard"
    }

    fn change_count(&self) -> Result<u64, WatchError> {
        let pasteboard = self.pasteboard.lock().unwrap();
        unsafe {
            let count: i64 = msg_send![*pasteboard, changeCount];
            Ok(count as u64)
        }
    }

    fn snapshot(&self) -> Result<NativePayload, WatchError> {
        let pasteboard = self.pasteboard.lock().unwrap();
        let mut payload = NativePayload::new();
        unsafe {
            if let Some(text) = Self::read_string_type(*pasteboard, NS_PASTEBOARD_TYPE_STRING) {
                if !text.is_empty() {
                    payload.push(TEXT_PLAIN, text.into_bytes());
                }
            }
            if let Some(rtf) = Self::read_string_type(*pasteboard, NS_PASTEBOARD_TYPE_RTF) {
                if !rtf.is_empty() {
                    payload.push("text/rtf", rtf.into_bytes());
                }
            }
        }
        Ok(payload)
    }

    fn apply(&self, payload: &NativePayload) -> Result<(), WatchError> {
        let text = payload
            .get(&TEXT_PLAIN.into())
            .and_then(|data| std::str::from_utf8(data).ok())
            .ok_or_else(|| {
                WatchError::Platform("No representation this backend can write".into())
            })?;

        let pasteboard = self.pasteboard.lock().unwrap();
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let _: i64 = msg_send![*pasteboard, clearContents];
            let pb_type = Self::type_string(NS_PASTEBOARD_TYPE_STRING);
            let value = NSString::alloc(nil).init_str(text);
            let ok: bool = msg_send![*pasteboard, setString: value forType: pb_type];
            let _: () = msg_send![pool, drain];
            if !ok {
                return Err(WatchError::Platform("setString refused".into()));
            }
        }
        Ok(())
    }

    fn source_app(&self) -> Option<String> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let app: id = msg_send![workspace, frontmostApplication];
            if app == nil {
                let _: () = msg_send![pool, drain];
                return None;
            }
            let name: id = msg_send![app, localizedName];
            if name == nil {
                let _: () = msg_send![pool, drain];
                return None;
            }
            let utf8_ptr: *const c_char = msg_send![name, UTF8String];
            if utf8_ptr.is_null() {
                let _: () = msg_send![pool, drain];
                return None;
            }
            let result = CStr::from_ptr(utf8_ptr).to_string_lossy().into_owned();
            let _: () = msg_send![pool, drain];
            Some(result)
        }
    }
}

// The raw pasteboard pointer is only touched behind the mutex.
unsafe impl Send for PasteboardClipboard {}
unsafe impl Sync for PasteboardClipboard {}
