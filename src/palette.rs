//! Palette tables for indexed layer data.
//!
//! Both formats store palette entries as four bytes in B,G,R,A order.
//! Tile layers carry one palette each; animation collections carry one
//! palette grid with a column per render layer, all columns the same size.

use image::Rgba;

use crate::cursor::Cursor;
use crate::error::{Result, ZarError};

/// Hard limit on declared palette entries in both formats.
pub const MAX_PALETTE_ENTRIES: u32 = 256;

/// A palette with one column of colors per render layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    columns: Vec<Vec<Rgba<u8>>>,
}

impl Palette {
    pub fn new(columns: Vec<Vec<Rgba<u8>>>) -> Self {
        Self { columns }
    }

    /// Single-column palette, as used by tile layers.
    pub fn single(entries: Vec<Rgba<u8>>) -> Self {
        Self {
            columns: vec![entries],
        }
    }

    pub fn layer_count(&self) -> usize {
        self.columns.len()
    }

    pub fn entry_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Color column for one render layer.
    ///
    /// Layers past the stored column count fall back to column 0, which
    /// only happens on malformed input and is logged by the caller.
    pub fn column(&self, layer: usize) -> &[Rgba<u8>] {
        self.columns
            .get(layer)
            .or_else(|| self.columns.first())
            .map_or(&[], Vec::as_slice)
    }
}

/// Validate a declared entry count against the 256-entry limit.
pub fn check_entry_count(count: u32) -> Result<usize> {
    if count > MAX_PALETTE_ENTRIES {
        return Err(ZarError::PaletteOverflow(count));
    }
    Ok(count as usize)
}

/// Read `count` B,G,R,A entries from the cursor as RGBA colors.
pub fn read_entries(
    cursor: &mut Cursor<'_>,
    count: usize,
    context: &'static str,
) -> Result<Vec<Rgba<u8>>> {
    let raw = cursor.take(count * 4, context)?;
    Ok(raw
        .chunks_exact(4)
        .map(|bgra| Rgba([bgra[2], bgra[1], bgra[0], bgra[3]]))
        .collect())
}
