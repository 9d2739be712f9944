//! Color extractor
//!
//! Colors travel as hex text: `#RRGGBB` or `#RRGGBBAA`. Stored packed
//! as 0xAARRGGBB so peer comparison is a plain integer equality.

use bytes::Bytes;
use std::path::Path;

use super::{decode_utf8, require_entry, ExtractError, FormatExtractor, PreCollected};
use crate::payload::{FormatDescriptor, NativePayload};
use crate::record::{ItemKind, ItemPayload, PasteItem};

/// Canonical descriptor used when rendering colors back out
pub const X_COLOR: &str = "application/x-color";

/// Extractor for color representations
pub struct ColorExtractor;

fn parse_hex_color(text: &str) -> Option<u32> {
    let hex = text.trim().strip_prefix('#')?;
    match hex.len() {
        6 => {
            let rgb = u32::from_str_radix(hex, 16).ok()?;
            Some(0xff00_0000 | rgb)
        }
        8 => {
            let rgba = u32::from_str_radix(hex, 16).ok()?;
            // text order is RRGGBBAA, storage order is AARRGGBB
            Some((rgba >> 8) | ((rgba & 0xff) << 24))
        }
        _ => None,
    }
}

fn format_hex_color(argb: u32) -> String {
    let alpha = (argb >> 24) & 0xff;
    let rgb = argb & 0x00ff_ffff;
    if alpha == 0xff {
        format!("#{rgb:06X}")
    } else {
        format!("#{rgb:06X}{alpha:02X}")
    }
}

impl FormatExtractor for ColorExtractor {
    fn kind(&self) -> ItemKind {
        ItemKind::Color
    }

    fn claims(&self) -> &'static [&'static str] {
        &[X_COLOR]
    }

    fn pre_collect(
        &self,
        descriptor: &FormatDescriptor,
        payload: &NativePayload,
    ) -> Result<PreCollected, ExtractError> {
        let data = require_entry(descriptor, payload)?;
        Ok(PreCollected {
            descriptor: descriptor.clone(),
            kind: ItemKind::Color,
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
        let argb = parse_hex_color(&text).ok_or_else(|| {
            ExtractError::Decode(pre.descriptor.to_string(), format!("not a color: {text:?}"))
        })?;
        Ok(PasteItem::color(argb))
    }

    fn render(&self, item: &PasteItem) -> Result<(FormatDescriptor, Bytes), ExtractError> {
        match &item.payload {
            ItemPayload::Color { argb } => Ok((
                FormatDescriptor::new(X_COLOR),
                Bytes::from(format_hex_color(*argb).into_bytes()),
            )),
            _ => Err(ExtractError::Unrenderable(item.kind())),
        }
    }
}
