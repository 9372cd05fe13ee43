//! Decoder for the legacy zar tile/sprite binary asset formats.
//!
//! This library provides functionality to:
//! - Parse static multi-layer tile assets and animated multi-layer sprite
//!   assets from their undocumented binary formats
//! - Decode the custom four-command run-length pixel codec and the
//!   deflate-wrapped animation payloads
//! - Composite per-layer indexed pixels into RGBA frame buffers a
//!   renderer can consume
//! - Memoize parsed assets so each file is decoded at most once

pub mod cache;
pub mod cli;
pub mod collection;
pub mod compositor;
pub mod cursor;
pub mod error;
pub mod inflate;
pub mod palette;
pub mod rle;
pub mod sprite;
pub mod tile;
pub mod timeline;

pub use cache::AssetCache;
pub use collection::DecodedCollection;
pub use error::{Result, ZarError};
pub use sprite::{LoadOptions, SpriteAsset};
pub use tile::TileAsset;
pub use timeline::{Event, Sequence};
