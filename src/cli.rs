//! Command-line interface implementation

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cache::AssetCache;
use crate::error::Result;
use crate::sprite::SpriteAsset;
use crate::tile::TileAsset;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

/// zar - inspect and export legacy tile/sprite binary assets
#[derive(Parser)]
#[command(name = "zar")]
#[command(about = "Inspect and export legacy tile/sprite binary assets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetKind {
    Tile,
    Sprite,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print header, sequence, and collection metadata for an asset
    Info {
        /// Input asset file
        input: PathBuf,

        /// Treat the input as a tile or sprite. Default: sprites have a
        /// .zar extension, everything else is a tile.
        #[arg(long)]
        kind: Option<AssetKind>,
    },
    /// Decode an asset and write its frames as PNG files
    Export {
        /// Input asset file
        input: PathBuf,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Collection index to export (sprites only, default 0)
        #[arg(long, default_value = "0")]
        collection: usize,

        /// Treat the input as a tile or sprite
        #[arg(long)]
        kind: Option<AssetKind>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Info { input, kind } => info(&input, kind),
        Commands::Export {
            input,
            output,
            collection,
            kind,
        } => export(&input, output.as_deref(), collection, kind),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn detect_kind(path: &Path, kind: Option<AssetKind>) -> AssetKind {
    kind.unwrap_or_else(|| {
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("zar")) {
            AssetKind::Sprite
        } else {
            AssetKind::Tile
        }
    })
}

fn info(input: &Path, kind: Option<AssetKind>) -> Result<()> {
    let cache = AssetCache::new();
    match detect_kind(input, kind) {
        AssetKind::Tile => print_tile_info(&*cache.load_tile(input)?),
        AssetKind::Sprite => print_sprite_info(&*cache.load_sprite(input)?),
    }
    Ok(())
}

fn print_tile_info(tile: &TileAsset) {
    println!("tile '{}' (v{})", tile.name, tile.version);
    println!("  kind: {:?}, material: {:?}", tile.kind, tile.material);
    println!("  size: {}x{}", tile.width, tile.height);
    println!("  bounds: {:?}", tile.bounds);
    println!("  flags: {:?}", tile.flags);
    println!("  layers: {}", tile.layers.len());
    for (i, layer) in tile.layers.iter().enumerate() {
        println!("    layer {i}: {}x{}", layer.width(), layer.height());
    }
}

fn print_sprite_info(sprite: &SpriteAsset) {
    println!(
        "sprite '{}' (pivot {},{}, {} layers)",
        sprite.name, sprite.pivot.0, sprite.pivot.1, sprite.layer_count
    );
    println!("  sequences: {}", sprite.sequences.len());
    for seq in &sprite.sequences {
        println!(
            "    '{}': {} frames, {} event buckets -> collection {}",
            seq.name,
            seq.frames.len(),
            seq.events.len(),
            seq.collection
        );
    }
    println!("  collections: {}", sprite.collections.len());
    for (i, col) in sprite.collections.iter().enumerate() {
        println!(
            "    {i}: '{}' {} frames x {} dirs, canvas {}x{} at ({},{})",
            col.name,
            col.frame_count,
            col.dir_count,
            col.canvas.0,
            col.canvas.1,
            col.origin.0,
            col.origin.1
        );
    }
}

fn export(
    input: &Path,
    output: Option<&Path>,
    collection: usize,
    kind: Option<AssetKind>,
) -> Result<()> {
    let out_dir = output.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(out_dir).map_err(|source| crate::error::ZarError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let cache = AssetCache::new();
    match detect_kind(input, kind) {
        AssetKind::Tile => {
            let tile = cache.load_tile(input)?;
            for (i, layer) in tile.layers.iter().enumerate() {
                let path = out_dir.join(format!("{}_layer{}.png", tile.name, i));
                save_png(layer, &path)?;
                println!("wrote {}", path.display());
            }
        }
        AssetKind::Sprite => {
            let sprite = cache.load_sprite(input)?;
            let decoded = sprite.decode_collection(collection)?;
            for dir in 0..decoded.dir_count as usize {
                for frame in 0..decoded.frame_count as usize {
                    // frame() only returns None past the bounds we loop in.
                    let Some(image) = decoded.frame(frame, dir) else {
                        continue;
                    };
                    let path = out_dir.join(format!(
                        "{}_c{}_d{}_f{}.png",
                        sprite.name, collection, dir, frame
                    ));
                    save_png(&image, &path)?;
                    println!("wrote {}", path.display());
                }
            }
        }
    }
    Ok(())
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|e| crate::error::ZarError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    })
}
