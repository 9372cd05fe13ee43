//! Animated sprite asset parsing.
//!
//! A sprite file holds a fixed-offset header, a sequence table, and a
//! collection table; the per-collection pixel payloads live further into
//! the file at offsets recorded in the table and are only decoded on first
//! access (see [`crate::collection`]).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use crate::collection::{self, DecodedCollection};
use crate::cursor::Cursor;
use crate::error::{Result, ZarError};
use crate::timeline::{self, Sequence};

/// Expected trailing type marker after the collection table. Other values
/// appear in the wild and are tolerated with a warning.
pub const TYPE_MARKER: u16 = 0x0001;

/// Bytes between a collection's recorded offset and the start of its
/// deflate payload.
const PAYLOAD_HEADER_SKIP: usize = 16;

/// Body categories whose sprites carry a single render layer instead of
/// the usual four. Matched against the name's category prefix (the part
/// before the first underscore).
const SINGLE_LAYER_CATEGORIES: &[&str] = &["beast", "critter", "effect", "missile", "prop"];

/// Destination rectangle for one (frame, direction) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One named animation's frame geometry plus its lazily decoded pixels.
#[derive(Debug)]
pub struct Collection {
    pub name: String,
    /// File offset of this collection's payload block.
    pub offset: u32,
    pub frame_count: u32,
    pub dir_count: u32,
    /// Direction-major: the rect for (frame, dir) sits at
    /// `dir * frame_count + frame`.
    pub rects: Vec<FrameRect>,
    /// Top-left of the union of all rects.
    pub origin: (i32, i32),
    /// Size of the union of all rects; every composited frame uses this
    /// canvas.
    pub canvas: (u32, u32),
    /// Decoded-frame cache, populated once on first access.
    decoded: Mutex<Option<Arc<DecodedCollection>>>,
}

impl Collection {
    pub fn rect(&self, frame: u32, dir: u32) -> Option<&FrameRect> {
        if frame >= self.frame_count || dir >= self.dir_count {
            return None;
        }
        self.rects.get((dir * self.frame_count + frame) as usize)
    }
}

/// Options controlling sprite parsing.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit render-layer count (1 or 4). When unset, the legacy
    /// name-based sniff decides.
    pub layer_count: Option<usize>,
}

/// One animated multi-layer character sheet.
#[derive(Debug)]
pub struct SpriteAsset {
    pub path: PathBuf,
    pub name: String,
    pub pivot: (i32, i32),
    /// Render layers per zar slot stack: 4, or 1 for single-layer bodies.
    pub layer_count: usize,
    pub sequences: Vec<Sequence>,
    pub collections: Vec<Collection>,
    /// Raw file contents, retained for lazy collection decode.
    data: Vec<u8>,
}

impl SpriteAsset {
    /// Look up a sequence by name.
    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    /// Decode one collection's per-(frame, direction) RGBA buffers.
    ///
    /// Idempotent and memoized: the first call inflates and decodes the
    /// payload, later calls return the same shared result.
    pub fn decode_collection(&self, index: usize) -> Result<Arc<DecodedCollection>> {
        let col = self
            .collections
            .get(index)
            .ok_or(ZarError::IndexOutOfRange {
                what: "collection",
                index,
                limit: self.collections.len(),
            })?;

        let mut cache = col.decoded.lock().unwrap();
        if let Some(decoded) = &*cache {
            return Ok(Arc::clone(decoded));
        }

        let payload = self.payload_range(index, col)?;
        let decoded = Arc::new(collection::decode(col, self.layer_count, payload)?);
        *cache = Some(Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Composited RGBA buffer for one step of a named sequence.
    ///
    /// `frame_index` walks the sequence's frame list; `direction` selects
    /// the facing within the owning collection.
    pub fn frame(
        &self,
        sequence: &str,
        frame_index: usize,
        direction: usize,
    ) -> Result<Arc<RgbaImage>> {
        let seq = self
            .sequence(sequence)
            .ok_or_else(|| ZarError::UnknownSequence(sequence.to_string()))?;
        let frame = *seq
            .frames
            .get(frame_index)
            .ok_or(ZarError::IndexOutOfRange {
                what: "sequence frame",
                index: frame_index,
                limit: seq.frames.len(),
            })?;

        let decoded = self.decode_collection(seq.collection as usize)?;
        decoded
            .frame(frame as usize, direction)
            .ok_or(ZarError::IndexOutOfRange {
                what: "collection frame/direction",
                index: direction * decoded.frame_count as usize + frame as usize,
                limit: decoded.frame_count as usize * decoded.dir_count as usize,
            })
    }

    /// Byte range of a collection's payload: from its offset plus the
    /// fixed header skip, up to the next collection's offset (end of file
    /// for the last).
    fn payload_range(&self, index: usize, col: &Collection) -> Result<&[u8]> {
        let start = col.offset as usize + PAYLOAD_HEADER_SKIP;
        let end = self
            .collections
            .get(index + 1)
            .map_or(self.data.len(), |next| next.offset as usize);
        if start > end || end > self.data.len() {
            return Err(ZarError::TruncatedData {
                context: "collection payload range",
                needed: end.max(start),
                available: self.data.len(),
            });
        }
        Ok(&self.data[start..end])
    }
}

/// Layer count for a sprite whose options did not pin one explicitly.
///
/// A data-driven legacy special case: certain body categories were
/// authored single-layer and are recognized by name.
fn sniff_layer_count(name: &str) -> usize {
    let category = name.split('_').next().unwrap_or(name).to_ascii_lowercase();
    if SINGLE_LAYER_CATEGORIES.contains(&category.as_str()) {
        1
    } else {
        4
    }
}

/// Parse a sprite asset from its full file contents.
///
/// Header and tables are read eagerly; collection payloads stay raw inside
/// the returned asset until [`SpriteAsset::decode_collection`] touches
/// them.
pub fn parse_sprite(path: &Path, data: Vec<u8>, options: &LoadOptions) -> Result<SpriteAsset> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let layer_count = match options.layer_count {
        Some(n @ (1 | 4)) => n,
        Some(other) => {
            log::warn!("unsupported explicit layer count {other}, sniffing from asset name");
            sniff_layer_count(&name)
        }
        None => sniff_layer_count(&name),
    };

    let mut cursor = Cursor::new(&data);
    let pivot = (
        cursor.read_i32("sprite pivot x")?,
        cursor.read_i32("sprite pivot y")?,
    );
    cursor.skip(2, "sprite reserved word")?;
    cursor.skip(1, "sprite reserved byte")?;

    let sequence_count = cursor.read_u32("sequence count")? as usize;
    let mut sequences = Vec::with_capacity(sequence_count.min(1024));
    for _ in 0..sequence_count {
        sequences.push(timeline::decode_sequence(&mut cursor)?);
    }

    let collections = read_collection_table(&mut cursor)?;

    let marker = cursor.read_u16("sprite type marker")?;
    if marker != TYPE_MARKER {
        log::warn!("unexpected sprite type marker 0x{marker:04X} (expected 0x{TYPE_MARKER:04X})");
    }

    // Every sequence must resolve into the collection table.
    for seq in &sequences {
        if seq.collection as usize >= collections.len() {
            return Err(ZarError::IndexOutOfRange {
                what: "sequence collection",
                index: seq.collection as usize,
                limit: collections.len(),
            });
        }
    }

    log::debug!(
        "sprite '{name}': {} sequences, {} collections, {layer_count} layers",
        sequences.len(),
        collections.len()
    );

    Ok(SpriteAsset {
        path: path.to_path_buf(),
        name,
        pivot,
        layer_count,
        sequences,
        collections,
        data,
    })
}

fn read_collection_table(cursor: &mut Cursor<'_>) -> Result<Vec<Collection>> {
    let count = cursor.read_u16("collection count")? as usize;
    cursor.skip(2, "collection table reserved bytes")?;

    let mut collections = Vec::with_capacity(count);
    for _ in 0..count {
        cursor.skip(12, "collection reserved bytes")?;
        let offset = cursor.read_u32("collection file offset")?;
        let name = cursor.read_name("collection name")?;
        let frame_count = cursor.read_u32("collection frame count")?;
        let dir_count = cursor.read_u32("collection direction count")?;

        let cells = frame_count.saturating_mul(dir_count) as usize;
        // Absurd declared counts fail on the first missing rect read, so
        // only pre-allocate a sane amount.
        let mut rects = Vec::with_capacity(cells.min(4096));
        for _ in 0..cells {
            rects.push(FrameRect {
                x: cursor.read_i32("frame rect x")?,
                y: cursor.read_i32("frame rect y")?,
                width: cursor.read_i32("frame rect width")?,
                height: cursor.read_i32("frame rect height")?,
            });
        }

        let (origin, canvas) = rect_union(&rects);
        collections.push(Collection {
            name,
            offset,
            frame_count,
            dir_count,
            rects,
            origin,
            canvas,
            decoded: Mutex::new(None),
        });
    }
    Ok(collections)
}

/// Union of all destination rects: minimum origin and maximum extent.
fn rect_union(rects: &[FrameRect]) -> ((i32, i32), (u32, u32)) {
    if rects.is_empty() {
        return ((0, 0), (0, 0));
    }
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for rect in rects {
        min_x = min_x.min(rect.x);
        min_y = min_y.min(rect.y);
        max_x = max_x.max(rect.x.saturating_add(rect.width));
        max_y = max_y.max(rect.y.saturating_add(rect.height));
    }
    (
        (min_x, min_y),
        (
            (max_x - min_x).max(0) as u32,
            (max_y - min_y).max(0) as u32,
        ),
    )
}
