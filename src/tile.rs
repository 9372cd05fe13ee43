//! Static tile asset parsing.
//!
//! Tile files carry a fixed-offset header followed by one or more
//! palette-indexed RLE layer blocks. Observed header versions 1, 7, 8 and 9
//! differ only in padding after the version word, not in field order.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::palette::{self, Palette};
use crate::rle::{self, BlockSubtype, LayerBlock};

/// Trailing bytes at or below this size are non-layer noise, not another
/// layer block. Legacy files pad their tails with junk the writer never
/// cleaned up.
const TRAILER_GUARD: usize = 1200;

/// What a tile represents in the world. Stored as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Floor,
    Wall,
    Doodad,
    Water,
    Roof,
    Overlay,
}

impl TileKind {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0 => TileKind::Floor,
            1 => TileKind::Wall,
            2 => TileKind::Doodad,
            3 => TileKind::Water,
            4 => TileKind::Roof,
            5 => TileKind::Overlay,
            other => {
                log::warn!("unknown tile kind byte {other}, treating as floor");
                TileKind::Floor
            }
        }
    }
}

/// Surface material, used by collaborators for footstep sounds and
/// movement cost. Stored as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    None,
    Dirt,
    Stone,
    Wood,
    Metal,
    Water,
    Grass,
    Snow,
}

impl Material {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Material::None,
            1 => Material::Dirt,
            2 => Material::Stone,
            3 => Material::Wood,
            4 => Material::Metal,
            5 => Material::Water,
            6 => Material::Grass,
            7 => Material::Snow,
            other => {
                log::warn!("unknown tile material byte {other}, treating as none");
                Material::None
            }
        }
    }
}

/// The tile header's 8-bit flag mask, decoded into named booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileFlags {
    pub blocks_walk: bool,
    pub blocks_sight: bool,
    pub blocks_missiles: bool,
    pub animated: bool,
    pub translucent: bool,
    pub climbable: bool,
    pub hazard: bool,
    pub indoor: bool,
}

impl TileFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            blocks_walk: bits & 0x01 != 0,
            blocks_sight: bits & 0x02 != 0,
            blocks_missiles: bits & 0x04 != 0,
            animated: bits & 0x08 != 0,
            translucent: bits & 0x10 != 0,
            climbable: bits & 0x20 != 0,
            hazard: bits & 0x40 != 0,
            indoor: bits & 0x80 != 0,
        }
    }
}

/// One static terrain/object graphic with its decoded layer images.
#[derive(Debug, Clone)]
pub struct TileAsset {
    pub path: PathBuf,
    pub name: String,
    pub version: u32,
    pub kind: TileKind,
    pub material: Material,
    pub flags: TileFlags,
    /// Three-byte bounding box from the header, kept verbatim.
    pub bounds: [u8; 3],
    /// Two opaque header words nothing downstream interprets yet.
    pub reserved: [u32; 2],
    pub width: u32,
    pub height: u32,
    /// Decoded layer images in file order, bottom first.
    pub layers: Vec<RgbaImage>,
}

/// Padding after the version word, per observed header version. Unknown
/// versions get the v1 layout and a warning.
fn version_padding(version: u32) -> usize {
    match version {
        1 => 0,
        7 => 2,
        8 => 4,
        9 => 6,
        other => {
            log::warn!("unknown tile header version {other}, assuming v1 layout");
            0
        }
    }
}

/// Parse a tile asset from its full file contents.
pub fn parse_tile(path: &Path, data: &[u8]) -> Result<TileAsset> {
    let mut cursor = Cursor::new(data);

    let version = cursor.read_u32("tile version")?;
    cursor.skip(version_padding(version), "tile version padding")?;

    let bounds_raw = cursor.take(3, "tile bounding box")?;
    let bounds = [bounds_raw[0], bounds_raw[1], bounds_raw[2]];
    let reserved = [
        cursor.read_u32("tile reserved word 0")?,
        cursor.read_u32("tile reserved word 1")?,
    ];
    let width = cursor.read_u32("tile width")?;
    let height = cursor.read_u32("tile height")?;
    let kind = TileKind::from_byte(cursor.read_u8("tile kind")?);
    let material = Material::from_byte(cursor.read_u8("tile material")?);
    let flags = TileFlags::from_bits(cursor.read_u8("tile flags")?);

    // Collect every layer block first; decode afterwards so a bad block
    // reports against a fully parsed header.
    let mut blocks: Vec<(LayerBlock, Palette)> = Vec::new();
    while cursor.remaining() > TRAILER_GUARD {
        blocks.push(read_layer_block(&mut cursor)?);
    }
    if blocks.is_empty() {
        log::warn!("tile {} declares no layer blocks", path.display());
    }

    let mut layers = Vec::with_capacity(blocks.len());
    for (block, block_palette) in &blocks {
        layers.push(rle::decode_layer(block, block_palette.column(0))?);
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    log::debug!(
        "tile '{name}': v{version} {width}x{height} {kind:?}/{material:?}, {} layers",
        layers.len()
    );

    Ok(TileAsset {
        path: path.to_path_buf(),
        name,
        version,
        kind,
        material,
        flags,
        bounds,
        reserved,
        width,
        height,
        layers,
    })
}

/// Read one layer sub-header, palette block, and RLE byte block.
fn read_layer_block(cursor: &mut Cursor<'_>) -> Result<(LayerBlock, Palette)> {
    let subtype = BlockSubtype::from_byte(cursor.read_u8("layer subtype")?);
    cursor.skip(1, "layer reserved byte")?;
    let width = cursor.read_u32("layer width")?;
    let height = cursor.read_u32("layer height")?;

    let presence = cursor.read_u8("palette presence flag")?;
    if presence == 0 {
        log::warn!("tile layer palette presence flag is zero, continuing with empty palette");
    }
    let count = palette::check_entry_count(cursor.read_u32("palette entry count")?)?;
    let entries = if presence != 0 {
        palette::read_entries(cursor, count, "palette entries")?
    } else {
        Vec::new()
    };

    let default_index = match subtype {
        BlockSubtype::Keyed => cursor.read_u8("default palette index")?,
        BlockSubtype::Plain => 0,
    };

    let rle_len = cursor.read_u32("layer rle length")? as usize;
    let data = cursor.take(rle_len, "layer rle data")?.to_vec();

    Ok((
        LayerBlock {
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            subtype,
            default_index,
            data,
        },
        Palette::single(entries),
    ))
}
