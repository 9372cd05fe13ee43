//! Process-wide memoization over the two parsers.
//!
//! The cache guarantees at most one parse per canonical file path, even
//! under concurrent first access: lookups and parses run under a single
//! cache mutex, which is sufficient because a parse happens once and the
//! result is immutable afterwards. Entries are evicted least-recently-used
//! once a capacity is exceeded; outstanding `Arc`s keep evicted assets
//! alive for whoever still holds them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, ZarError};
use crate::sprite::{self, LoadOptions, SpriteAsset};
use crate::tile::{self, TileAsset};

/// Default per-kind entry capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

struct Entry<T> {
    asset: Arc<T>,
    last_used: u64,
}

struct Inner {
    tiles: HashMap<PathBuf, Entry<TileAsset>>,
    sprites: HashMap<PathBuf, Entry<SpriteAsset>>,
    tick: u64,
}

/// Memoizing loader for tile and sprite assets.
pub struct AssetCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Cache holding at most `capacity` tiles and `capacity` sprites.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tiles: HashMap::new(),
                sprites: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Load a tile asset, parsing at most once per path.
    pub fn load_tile(&self, path: impl AsRef<Path>) -> Result<Arc<TileAsset>> {
        let path = path.as_ref();
        let key = cache_key(path);

        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(entry) = inner.tiles.get_mut(&key) {
            entry.last_used = tick;
            return Ok(Arc::clone(&entry.asset));
        }

        // Parse while holding the lock: concurrent first access must not
        // decode the same file twice. Failures are returned, not cached.
        let data = read_file(path)?;
        let asset = Arc::new(tile::parse_tile(path, &data)?);
        inner.tiles.insert(
            key,
            Entry {
                asset: Arc::clone(&asset),
                last_used: tick,
            },
        );
        evict_lru(&mut inner.tiles, self.capacity);
        Ok(asset)
    }

    /// Load a sprite asset with default options.
    pub fn load_sprite(&self, path: impl AsRef<Path>) -> Result<Arc<SpriteAsset>> {
        self.load_sprite_with(path, &LoadOptions::default())
    }

    /// Load a sprite asset, parsing at most once per path.
    ///
    /// `options` only matter on the first load of a path; later calls get
    /// the cached instance regardless.
    pub fn load_sprite_with(
        &self,
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Arc<SpriteAsset>> {
        let path = path.as_ref();
        let key = cache_key(path);

        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(entry) = inner.sprites.get_mut(&key) {
            entry.last_used = tick;
            return Ok(Arc::clone(&entry.asset));
        }

        let data = read_file(path)?;
        let asset = Arc::new(sprite::parse_sprite(path, data, options)?);
        inner.sprites.insert(
            key,
            Entry {
                asset: Arc::clone(&asset),
                last_used: tick,
            },
        );
        evict_lru(&mut inner.sprites, self.capacity);
        Ok(asset)
    }

    /// Number of cached entries (tiles plus sprites).
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.tiles.len() + inner.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry. Outstanding `Arc`s stay valid.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tiles.clear();
        inner.sprites.clear();
    }
}

/// Canonical cache key: resolved path where possible, the verbatim path
/// when the file system cannot resolve it.
fn cache_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ZarError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn evict_lru<T>(map: &mut HashMap<PathBuf, Entry<T>>, capacity: usize) {
    while map.len() > capacity {
        let Some(oldest) = map
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
        else {
            return;
        };
        log::debug!("evicting {} from asset cache", oldest.display());
        map.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Smallest well-formed tile file: header only, no layer blocks.
    fn minimal_tile_bytes() -> Vec<u8> {
        let mut out = 1u32.to_le_bytes().to_vec();
        out.extend_from_slice(&[0, 0, 0]); // bounding box
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0]); // kind, material, flags
        out
    }

    fn write_tile(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&minimal_tile_bytes()).unwrap();
        path
    }

    #[test]
    fn second_load_returns_the_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tile(dir.path(), "floor.zt");

        let cache = AssetCache::new();
        let first = cache.load_tile(&path).unwrap();
        let second = cache.load_tile(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_tile(dir.path(), "a.zt");
        let b = write_tile(dir.path(), "b.zt");

        let cache = AssetCache::with_capacity(1);
        let first_a = cache.load_tile(&a).unwrap();
        cache.load_tile(&b).unwrap();
        assert_eq!(cache.len(), 1);

        // "a" was evicted: loading it again parses a fresh instance, but
        // the old Arc is still usable.
        let second_a = cache.load_tile(&a).unwrap();
        assert!(!Arc::ptr_eq(&first_a, &second_a));
        assert_eq!(first_a.name, "a");
    }

    #[test]
    fn failures_are_not_cached_and_do_not_disturb_entries() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_tile(dir.path(), "good.zt");

        let cache = AssetCache::new();
        let asset = cache.load_tile(&good).unwrap();

        let missing = dir.path().join("missing.zt");
        assert!(matches!(
            cache.load_tile(&missing).unwrap_err(),
            ZarError::Io { .. }
        ));
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&asset, &cache.load_tile(&good).unwrap()));
    }

    #[test]
    fn clear_keeps_outstanding_arcs_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tile(dir.path(), "t.zt");

        let cache = AssetCache::new();
        let asset = cache.load_tile(&path).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(asset.name, "t");
    }
}
