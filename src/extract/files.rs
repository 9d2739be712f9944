//! File-list extractor
//!
//! Decodes `file://` URI lists into path references. Pre-collection only
//! parses the (small) URI text; file sizes are resolved during load.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{decode_utf8, require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{FileRef, ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering file lists back out
pub const URI_LIST: &str = "text/uri-list";

/// Extractor for file-list representations
pub struct FileListExtractor;

/// Parse the file paths out of a uri-list body. Comment lines and the
/// gnome-copied-files `copy`/`cut` verb line are skipped.
fn parse_uri_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| *line != "copy" && *line != "cut")
        .filter_map(|line| line.strip_prefix("file://"))
        .map(percent_decode)
        .map(PathBuf::from)
        .collect()
}

/// Minimal percent-decoding for the path portion of a file URI
fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&path[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn encode_uri(path: &Path) -> String {
    let mut encoded = String::from("file://");
    for byte in path.to_string_lossy().bytes() {
        match byte {
            b'%' | b' ' | b'\n' | b'\r' | b'\t' => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
            _ => encoded.push(byte as char),
        }
    }
    encoded
}

impl FormatExtractor for FileListExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::FileList
    }

    fn claims(&self) -> &'static [&'static str] {
        &[URI_LIST, "x-special/gnome-copied-files", "public.file-url"]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        let text = decode_utf8(descriptor, data)?;
        let paths = parse_uri_list(&text);
        if paths.is_empty() {
            return Err(ExtractError::Decode(
                descriptor.to_string(),
                "no file URIs in list".into(),
            ));
        }
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::FileList,
            declared_size: data.len() as u64,
            entry_count: paths.len(),
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

        let mut files = Vec::new();
        for path in parse_uri_list(&text) {
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => files.push(FileRef {
                    size: meta.len(),
                    path,
                }),
                Ok(_) => warn!("Skipping non-regular file in clipboard list: {:?}", path),
                Err(e) => warn!("Skipping unreadable clipboard file {:?}: {}", path, e),
            }
        }

        if files.is_empty() {
            return Err(ExtractError::Decode(
                pre.descriptor.to_string(),
                "no readable files remained".into(),
            ));
        }
        Ok(PasteItem::file_list(files))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::FileList { files } => {
                let body: String = files
                    .iter()
                    .map(|f| encode_uri(&f.path))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok((FormatDescriptor::new(URI_LIST), Bytes::from(body.into_bytes())))
            }
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_uri_list_variants() {
        let body = "# comment\ncopy\nfile:///tmp/a.txt\nfile:///tmp/with%20space.txt\n";
        let paths = parse_uri_list(body);
        assert_eq!(
            paths,
            vec![PathBuf::from("/tmp/a.txt"), PathBuf::from("/tmp/with space.txt")]
        );
    }

    #[test]
    fn test_pre_collect_counts_without_fs_access() {
        let mut payload = NativePayload::new();
        payload.push(
            URI_LIST,
            Bytes::from_static(b"file:///does/not/exist/a\nfile:///does/not/exist/b"),
        );

        let extractor = FileListExtractor;
        let pre = extractor
            .pre_collect(&FormatDescriptor::new(URI_LIST), &payload)
            .unwrap();
        assert_eq!(pre.entry_count, 2);
    }

    #[test]
    fn test_load_resolves_sizes_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real.bin");
        let mut f = std::fs::File::create(&real).unwrap();
        f.write_all(&[0u8; 321]).unwrap();

        let body = format!("file://{}\nfile:///gone/away", real.display());
        let mut payload = NativePayload::new();
        payload.push(URI_LIST, Bytes::from(body.into_bytes()));

        let extractor = FileListExtractor;
        let desc = FormatDescriptor::new(URI_LIST);
        let pre = extractor.pre_collect(&desc, &payload).unwrap();
        let item = extractor.load(&pre, &payload, dir.path()).unwrap();

        assert_eq!(item.file_refs().len(), 1);
        assert_eq!(item.file_refs()[0].size, 321);
        assert_eq!(item.size, 321);
    }

    #[test]
    fn test_render_encodes_spaces() {
        let item = PasteItem::file_list(vec![FileRef {
            path: PathBuf::from("/tmp/a b.txt"),
            size: 1,
        }]);
        let (_, bytes) = FileListExtractor.render(&item).unwrap();
        assert_eq!(bytes.as_ref(), b"file:///tmp/a%20b.txt");
    }
}
