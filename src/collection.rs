//! Lazy decoding of one animation collection's payload.
//!
//! A payload is a deflate block containing a collection-wide palette grid
//! (one column per render layer) followed by the zar slots: one optional
//! RLE layer block per (direction, frame, layer), in that nesting order.
//! The decompressed buffer is discarded as soon as the slots have been
//! parsed; only the composited frames survive.

use std::sync::Arc;

use image::RgbaImage;

use crate::compositor;
use crate::cursor::Cursor;
use crate::error::{Result, ZarError};
use crate::inflate;
use crate::palette::{self, Palette};
use crate::rle::{BlockSubtype, LayerBlock};
use crate::sprite::Collection;

/// A collection's composited per-(frame, direction) RGBA buffers.
///
/// Immutable once built; frames are shared as `Arc`s and safe to hand to
/// any thread.
#[derive(Debug)]
pub struct DecodedCollection {
    /// Canvas origin in the sprite's coordinate space.
    pub origin: (i32, i32),
    /// Canvas size; every frame buffer has these dimensions.
    pub size: (u32, u32),
    pub frame_count: u32,
    pub dir_count: u32,
    frames: Vec<Arc<RgbaImage>>,
}

impl DecodedCollection {
    /// Frame buffer for one (frame, direction) pair.
    pub fn frame(&self, frame: usize, dir: usize) -> Option<Arc<RgbaImage>> {
        if frame >= self.frame_count as usize || dir >= self.dir_count as usize {
            return None;
        }
        self.frames
            .get(dir * self.frame_count as usize + frame)
            .cloned()
    }

    /// All frames, direction-major.
    pub fn frames(&self) -> &[Arc<RgbaImage>] {
        &self.frames
    }
}

/// Decode one collection payload into composited frames.
pub(crate) fn decode(
    col: &Collection,
    layer_count: usize,
    payload: &[u8],
) -> Result<DecodedCollection> {
    let plain = inflate::inflate_block(payload)?;
    let mut cursor = Cursor::new(&plain);

    let entry_count = palette::check_entry_count(cursor.read_u32("collection palette size")?)?;
    let mut columns = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        cursor.skip(4, "palette column reserved bytes")?;
        columns.push(palette::read_entries(
            &mut cursor,
            entry_count,
            "collection palette column",
        )?);
    }
    let palette = Palette::new(columns);

    let frames = col.frame_count as usize;
    let dirs = col.dir_count as usize;
    let cells = frames * dirs;
    let mut slots: Vec<Option<LayerBlock>> = Vec::with_capacity(cells * layer_count);
    for _ in 0..cells {
        for _ in 0..layer_count {
            slots.push(read_slot(&mut cursor)?);
        }
    }
    log::trace!(
        "collection '{}': {} of {} slots populated",
        col.name,
        slots.iter().filter(|s| s.is_some()).count(),
        slots.len()
    );

    let mut out = Vec::with_capacity(cells);
    for cell in 0..cells {
        let layers = &slots[cell * layer_count..(cell + 1) * layer_count];
        let frame = compositor::composite_cell(col.canvas, col.origin, layers, &palette)?;
        out.push(Arc::new(frame));
    }

    Ok(DecodedCollection {
        origin: col.origin,
        size: col.canvas,
        frame_count: col.frame_count,
        dir_count: col.dir_count,
        frames: out,
    })
}

/// Parse one zar slot: kind 0 is an empty frame (a single byte, kept for
/// slot alignment), kind 1 a populated layer block.
fn read_slot(cursor: &mut Cursor<'_>) -> Result<Option<LayerBlock>> {
    match cursor.read_u8("zar slot kind")? {
        0 => Ok(None),
        1 => {
            let x_offset = cursor.read_i32("zar slot x offset")?;
            let y_offset = cursor.read_i32("zar slot y offset")?;
            let subtype = BlockSubtype::from_byte(cursor.read_u8("zar slot subtype")?);
            cursor.skip(1, "zar slot reserved byte")?;
            let width = cursor.read_u32("zar slot width")?;
            let height = cursor.read_u32("zar slot height")?;

            // Palettes are collection-wide; a per-slot palette here means
            // the stream is not what we think it is.
            let presence = cursor.read_u8("zar slot palette flag")?;
            if presence != 0 {
                log::warn!("zar slot declares a local palette (flag {presence}), ignoring");
            }

            let rle_len = cursor.read_u32("zar slot rle length")? as usize;
            let data = cursor.take(rle_len, "zar slot rle data")?.to_vec();
            Ok(Some(LayerBlock {
                width,
                height,
                x_offset,
                y_offset,
                subtype,
                default_index: 0,
                data,
            }))
        }
        other => {
            // Slot kinds other than 0/1 leave no way to find the next
            // slot boundary; everything after this byte is unusable.
            log::warn!("unknown zar slot kind {other}, abandoning collection");
            Err(ZarError::TruncatedData {
                context: "zar slot kind",
                needed: cursor.position(),
                available: cursor.position().saturating_sub(1),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;

    #[test]
    fn empty_slot_consumes_one_byte() {
        let data = [0u8, 1, 2, 3];
        let mut cursor = Cursor::new(&data);
        assert!(read_slot(&mut cursor).unwrap().is_none());
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn populated_slot_parses_geometry_and_rle() {
        let mut data = Vec::new();
        data.push(1u8);
        data.extend_from_slice(&(-5i32).to_le_bytes());
        data.extend_from_slice(&12i32.to_le_bytes());
        data.push(0x33);
        data.push(0);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(0); // no local palette
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0b0000_0101, 0]); // run=1 cmd=1, index 0

        let slot = read_slot(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!((slot.x_offset, slot.y_offset), (-5, 12));
        assert_eq!((slot.width, slot.height), (1, 1));
        assert_eq!(slot.subtype, BlockSubtype::Plain);
        assert_eq!(slot.data, vec![0b0000_0101, 0]);
    }

    #[test]
    fn unknown_slot_kind_is_fatal() {
        let data = [7u8];
        assert!(read_slot(&mut Cursor::new(&data)).is_err());
    }
}
