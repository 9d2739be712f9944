//! URL extractor
//!
//! Several URL-shaped descriptors exist in the wild; all decode to the
//! same semantic item. Multi-line forms (moz-url carries a title line)
//! keep only the first line.

use bytes::Bytes;
use std::path::Path;

use super::{decode_utf8, require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering URLs back out
pub const TEXT_URI: &str = "text/x-uri";

/// Extractor for URL representations
pub struct UrlExtractor;

impl FormatExtractor for UrlExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::Url
    }

    fn claims(&self) -> &'static [&'static str] {
        &[TEXT_URI, "text/x-moz-url", "public.url"]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::Url,
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
        let text = decode_utf8(&pre.descriptor, data)?;
        let url = text.lines().next().unwrap_or("").trim().to_string();
        if url.is_empty() || !url.contains("://") {
            return Err(ExtractError::Decode(
                pre.descriptor.to_string(),
                format!("not a URL: {url:?}"),
            ));
        }
        Ok(PasteItem::url(url))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::Url { value } => Ok((
                FormatDescriptor::new(TEXT_URI),
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
    fn test_moz_url_keeps_first_line() {
        let mut payload = NativePayload::new();
        payload.push(
            "text/x-moz-url",
            Bytes::from_static(b"https://example.com/page\nPage Title"),
        );

        let extractor = UrlExtractor;
        let desc = FormatDescriptor::new("text/x-moz-url");
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, Path::new("/tmp")).unwrap();
        assert_eq!(
            item.payload,
            ItemPayload::Url { value: "https://example.com/page".into() }
        );
    }

    #[test]
    fn test_rejects_non_url_text() {
        let mut payload = NativePayload::new();
        payload.push(TEXT_URI, Bytes::from_static(b"just words"));

        let extractor = UrlExtractor;
        let desc = FormatDescriptor::new(TEXT_URI);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        assert!(extractor.load(&pre, &payload, Path::new("/tmp")).is_err());
    }
}
