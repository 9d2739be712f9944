//! HTML and rich-text extractors

use bytes::Bytes;
use std::path::Path;

use super::{decode_utf8, require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering HTML back out
pub const TEXT_HTML: &str = "text/html";
/// Canonical descriptor used when rendering RTF back out
pub const TEXT_RTF: &str = "text/rtf";

/// Extractor for HTML markup representations
pub struct HtmlExtractor;

impl FormatExtractor for HtmlExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::Html
    }

    fn claims(&self) -> &'static [&'static str] {
        &[TEXT_HTML, "text/html;charset=utf-8"]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::Html,
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
        Ok(PasteItem::html(value))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::Html { value } => Ok((
                FormatDescriptor::new(TEXT_HTML),
                Bytes::from(value.clone().into_bytes()),
            )),
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}

/// Extractor for RTF representations
pub struct RtfExtractor;

impl FormatExtractor for RtfExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::Rtf
    }

    fn claims(&self) -> &'static [&'static str] {
        &[TEXT_RTF, "application/rtf", "application/x-rtf"]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::Rtf,
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
        if !value.starts_with("{\\rtf") {
            return Err(ExtractError::Decode(
                pre.descriptor.to_string(),
                "missing RTF header".into(),
            ));
        }
        Ok(PasteItem::rtf(value))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::Rtf { value } => Ok((
                FormatDescriptor::new(TEXT_RTF),
                Bytes::from(value.clone().into_bytes()),
            )),
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_extract() {
        let mut payload = NativePayload::new();
        payload.push(TEXT_HTML, Bytes::from_static(b"<b>bold</b>"));

        let extractor = HtmlExtractor;
        let desc = FormatDescriptor::new(TEXT_HTML);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, Path::new("/tmp")).unwrap();
        assert_eq!(item.payload, ItemPayload::Html { value: "<b>bold</b>".into() });
    }

    #[test]
    fn test_rtf_requires_header() {
        let mut payload = NativePayload::new();
        payload.push(TEXT_RTF, Bytes::from_static(b"plain text"));

        let extractor = RtfExtractor;
        let desc = FormatDescriptor::new(TEXT_RTF);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        assert!(extractor.load(&pre, &payload, Path::new("/tmp")).is_err());

        payload.push(TEXT_RTF, Bytes::from_static(b"{\\rtf1 hello}"));
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, Path::new("/tmp")).unwrap();
        assert_eq!(item.kind(), ItemKind::Rtf);
    }
}
