//! Length-prefixed deflate payload reader.
//!
//! Animation collection payloads are stored as a u32 plain-size prefix
//! followed by a zlib-wrapped deflate stream. The prefix is authoritative:
//! the decompressor must yield at least that many bytes, and anything past
//! the declared size is dropped.

use std::io::Read;

use crate::cursor::Cursor;
use crate::error::{Result, ZarError};

/// Decompress one length-prefixed deflate block.
///
/// `data` is the full byte range of the block: four bytes of plain size,
/// then the compressed stream. Returns exactly `plain_size` bytes, or
/// `TruncatedData` if the stream ends early.
pub fn inflate_block(data: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(data);
    let plain_size = cursor.read_u32("deflate plain size")? as usize;

    let mut plain = Vec::with_capacity(plain_size);
    let mut decoder = flate2::read::ZlibDecoder::new(&data[4..]);
    decoder
        .read_to_end(&mut plain)
        .map_err(|e| ZarError::Deflate(e.to_string()))?;

    log::trace!(
        "inflated {} compressed bytes to {} (declared {})",
        data.len() - 4,
        plain.len(),
        plain_size
    );

    if plain.len() < plain_size {
        return Err(ZarError::TruncatedData {
            context: "deflate payload",
            needed: plain_size,
            available: plain.len(),
        });
    }
    plain.truncate(plain_size);
    Ok(plain)
}
