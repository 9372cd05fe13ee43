//! Error taxonomy for asset decoding.
//!
//! Fatal conditions (truncated data, palette overflow, broken deflate
//! streams) are returned as `ZarError` and abort decoding of the asset or
//! collection at hand. Recoverable format anomalies (unknown subtype bytes,
//! unexpected trailing markers, unrecognized event codes) are logged as
//! warnings at the site that observes them and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = ZarError> = std::result::Result<T, E>;

/// Error type for tile/sprite decoding failures.
#[derive(Debug, Error)]
pub enum ZarError {
    /// The asset file could not be read at all.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read or run-length consumption went past the available bytes.
    #[error("truncated data reading {context}: need {needed} bytes, have {available}")]
    TruncatedData {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// The deflate stream inside a collection payload is corrupt.
    #[error("deflate stream error: {0}")]
    Deflate(String),

    /// A palette declared more entries than the 256 the formats allow.
    #[error("palette declares {0} entries, maximum is 256")]
    PaletteOverflow(u32),

    /// An RLE decode produced a pixel count other than width*height.
    #[error("layer decode produced {actual} pixels, expected {expected} ({width}x{height})")]
    PixelCountMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// A frame lookup named a sequence the sprite does not contain.
    #[error("sprite has no sequence named '{0}'")]
    UnknownSequence(String),

    /// A frame, direction, or collection index fell outside its table.
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },
}
