//! Image extractor
//!
//! Image bytes are staged to a scratch file during load and the record
//! keeps a path reference, so large bitmaps never live inline in the
//! record store.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::Path;

use super::{require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{FileRef, ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering images back out
pub const IMAGE_PNG: &str = "image/png";

/// Extractor for bitmap representations
pub struct ImageListExtractor;

fn extension_for(descriptor: &FormatDescriptor) -> &'static str {
    match descriptor.as_str() {
        "image/tiff" => "tiff",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

impl FormatExtractor for ImageListExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::ImageList
    }

    fn claims(&self) -> &'static [&'static str] {
        &[IMAGE_PNG, "image/tiff", "image/bmp"]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::ImageList,
            declared_size: data.len() as u64,
            entry_count: 1,
        })
    }

    fn load(
        &self,
        pre: &PreCollected,
        payload: &NativePayload,
        scratch: &Path,
    ) -> Result<PasteItem, ExtractError> {
        let data = require_entry(&pre.descriptor, payload)?;

        // Content-addressed name keeps repeated copies of the same image
        // from piling up in the scratch dir.
        let digest = hex::encode(Sha256::digest(data));
        let filename = format!("{}.{}", &digest[..16], extension_for(&pre.descriptor));
        let path = scratch.join(filename);

        std::fs::create_dir_all(scratch)?;
        if !path.exists() {
            std::fs::write(&path, data)?;
        }

        Ok(PasteItem::image_list(vec![FileRef {
            path,
            size: data.len() as u64,
        }]))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::ImageList { images } => {
                let first = images
                    .first()
                    .ok_or_else(|| ExtractError::Empty("image list".into()))?;
                let data = std::fs::read(&first.path)?;
                Ok((FormatDescriptor::new(IMAGE_PNG), Bytes::from(data)))
            }
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_stages_bytes_to_scratch() {
        let dir = TempDir::new().unwrap();
        let mut payload = NativePayload::new();
        payload.push(IMAGE_PNG, Bytes::from_static(b"\x89PNG fake image"));

        let extractor = ImageListExtractor;
        let desc = FormatDescriptor::new(IMAGE_PNG);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, dir.path()).unwrap();

        let refs = item.file_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(std::fs::read(&refs[0].path).unwrap(), b"\x89PNG fake image");
        assert_eq!(item.size, 15);
    }

    #[test]
    fn test_same_bytes_reuse_scratch_file() {
        let dir = TempDir::new().unwrap();
        let mut payload = NativePayload::new();
        payload.push(IMAGE_PNG, Bytes::from_static(b"same bytes"));

        let extractor = ImageListExtractor;
        let desc = FormatDescriptor::new(IMAGE_PNG);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let a = extractor.load(&pre, &payload, dir.path()).unwrap();
        let b = extractor.load(&pre, &payload, dir.path()).unwrap();
        assert_eq!(a.file_refs()[0].path, b.file_refs()[0].path);
    }

    #[test]
    fn test_render_reads_staged_file() {
        let dir = TempDir::new().unwrap();
        let mut payload = NativePayload::new();
        payload.push(IMAGE_PNG, Bytes::from_static(b"pixels"));

        let extractor = ImageListExtractor;
        let desc = FormatDescriptor::new(IMAGE_PNG);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, dir.path()).unwrap();

        let (rdesc, bytes) = extractor.render(&item).unwrap();
        assert_eq!(rdesc.as_str(), IMAGE_PNG);
        assert_eq!(bytes.as_ref(), b"pixels");
    }
}
