//! Sequence timeline decoding.
//!
//! A sequence is stored as a run of signed 16-bit codes. Non-negative codes
//! are frame indices; negative codes are sentinel-tagged timeline events,
//! some of which consume extra 16-bit operands. The sentinels are decoded
//! eagerly into the [`Event`] variants here, so downstream code never
//! re-tests magic numbers.

use std::collections::BTreeMap;

use crate::cursor::Cursor;
use crate::error::{Result, ZarError};

/// Which foot lands on a footstep event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootSide {
    Left,
    Right,
}

/// A tagged timeline marker embedded in a sequence's code stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Per-frame timing override in milliseconds (code -3).
    Timing(u16),
    /// Loop-point marker (code -4).
    Loop,
    /// Jump to another position in the sequence (code -5).
    Jump(u16),
    /// Start of an overlay animation (code -6).
    OverlayBegin,
    /// Footstep sound cue (codes -40/-41).
    Footstep(FootSide),
    /// Melee hit connects (code -42).
    Hit,
    /// Projectile launch with a 3-component vector operand (code -43).
    WeaponFired([i16; 3]),
    /// Generic sound cue (code -44).
    Sound,
    /// Item pickup cue (code -45).
    Pickup,
    /// Unrecognized negative code, kept for inspection. Assumed to carry
    /// no operands; a new operand-bearing code would desynchronize the
    /// stream and surface as a code-count error.
    Unknown(i16),
}

/// A named timeline bound to one animation collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub name: String,
    /// Ordered frame indices into the owning collection.
    pub frames: Vec<u16>,
    /// Events bucketed by cumulative frame position. Position 0 holds
    /// events that fire before the first frame.
    pub events: BTreeMap<u32, Vec<Event>>,
    /// Index into the sprite's collection table.
    pub collection: u16,
}

impl Sequence {
    /// Events at one cumulative frame position, if any.
    pub fn events_at(&self, position: u32) -> &[Event] {
        self.events.get(&position).map_or(&[], Vec::as_slice)
    }
}

/// Decode one sequence record from the sprite header.
///
/// Layout: u16 code count `N`, `N` signed 16-bit codes (operands included
/// in the count), a reserved trailer of 4*N bytes, a length-prefixed name,
/// and a u16 collection index.
pub fn decode_sequence(cursor: &mut Cursor<'_>) -> Result<Sequence> {
    let declared = cursor.read_u16("sequence code count")? as usize;

    let mut frames = Vec::new();
    let mut events: BTreeMap<u32, Vec<Event>> = BTreeMap::new();
    let mut consumed = 0usize;

    while consumed < declared {
        let code = cursor.read_i16("sequence code")?;
        consumed += 1;

        if code >= 0 {
            frames.push(code as u16);
            continue;
        }

        let mut operand = |what: &'static str| -> Result<i16> {
            consumed += 1;
            cursor.read_i16(what)
        };

        let event = match code {
            -3 => Event::Timing(operand("timing operand")? as u16),
            -4 => Event::Loop,
            -5 => Event::Jump(operand("jump operand")? as u16),
            -6 => Event::OverlayBegin,
            -40 => Event::Footstep(FootSide::Left),
            -41 => Event::Footstep(FootSide::Right),
            -42 => Event::Hit,
            -43 => Event::WeaponFired([
                operand("weapon vector x")?,
                operand("weapon vector y")?,
                operand("weapon vector z")?,
            ]),
            -44 => Event::Sound,
            -45 => Event::Pickup,
            other => {
                log::warn!("unknown sequence event code {other}, assuming no operands");
                Event::Unknown(other)
            }
        };

        if consumed > declared {
            // An operand ran past the declared code count: the stream is
            // desynchronized and nothing after this point can be trusted.
            return Err(ZarError::TruncatedData {
                context: "sequence event operands",
                needed: consumed,
                available: declared,
            });
        }

        events.entry(frames.len() as u32).or_default().push(event);
    }

    cursor.skip(4 * declared, "sequence reserved trailer")?;
    let name = cursor.read_name("sequence name")?;
    let collection = cursor.read_u16("sequence collection index")?;

    log::debug!(
        "sequence '{name}': {} frames, {} event buckets, collection {collection}",
        frames.len(),
        events.len()
    );

    Ok(Sequence {
        name,
        frames,
        events,
        collection,
    })
}
