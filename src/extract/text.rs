//! Plain text extractor

use bytes::Bytes;
use std::path::Path;

use super::{decode_utf8, require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering text back out
pub const TEXT_PLAIN: &str = "text/plain";

/// Extractor for plain text representations
pub struct TextExtractor;

impl FormatExtractor for TextExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::Text
    }

    fn claims(&self) -> &'static [&'static str] {
        &[
            TEXT_PLAIN,
            "text/plain;charset=utf-8",
            "UTF8_STRING",
            "STRING",
        ]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::Text,
            declared_size: data.len() as u64,
            entry_count: 1,
        })
    }

    fn load(
        &self,
        pre: &PreCollected,
        payload: &NativePayload,
        _scratch: &Path,
    ) -> Result<PasteItem, ExtractError> {
        let data = require_entry(&pre.descriptor, payload)?;
        let value = decode_utf8(&pre.descriptor, data)?;
        Ok(PasteItem::text(value))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::Text { value } => Ok((
                FormatDescriptor::new(TEXT_PLAIN),
                Bytes::from(value.clone().into_bytes()),
            )),
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}
