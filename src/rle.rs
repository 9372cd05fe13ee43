//! Run-length pixel codec shared by tile layers and sprite zar slots.
//!
//! Each control byte packs a command in its low two bits and a run length
//! in the high six bits:
//!
//! - `0` — skip `run` pixels; the draw cursor advances, nothing is written
//! - `1` — `run` palette-index bytes follow, painted fully opaque
//! - `2` — `run` (index, alpha) byte pairs follow
//! - `3` — `run` alpha bytes follow, painted with the block's default
//!   palette entry
//!
//! Decoding consumes exactly the block's declared byte length. Producing
//! any pixel count other than width*height is a hard error.

use image::{Rgba, RgbaImage};

use crate::cursor::Cursor;
use crate::error::{Result, ZarError};

/// Legacy subtype byte for plain indexed blocks (ASCII '3').
pub const SUBTYPE_PLAIN: u8 = 0x33;
/// Legacy subtype byte for blocks keyed to a default color (ASCII '4').
pub const SUBTYPE_KEYED: u8 = 0x34;

/// Fallback color painted when an index points outside the palette.
const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// The two legal layer-block subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSubtype {
    /// Subtype '3': indexed pixels only.
    Plain,
    /// Subtype '4': carries a default-color index used by command 3.
    Keyed,
}

impl BlockSubtype {
    /// Decode the subtype byte. Anything but '3'/'4' is a recoverable
    /// anomaly: log it and fall back to `Plain`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SUBTYPE_PLAIN => BlockSubtype::Plain,
            SUBTYPE_KEYED => BlockSubtype::Keyed,
            other => {
                log::warn!("unsupported layer subtype byte 0x{other:02X}, treating as '3'");
                BlockSubtype::Plain
            }
        }
    }
}

/// One undecoded RLE-encoded image layer plus its placement offset.
#[derive(Debug, Clone)]
pub struct LayerBlock {
    pub width: u32,
    pub height: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub subtype: BlockSubtype,
    /// Palette entry used by command 3 in lieu of per-pixel indices.
    pub default_index: u8,
    /// Raw RLE byte sequence, exactly as stored.
    pub data: Vec<u8>,
}

/// Decode one layer block against its palette column.
///
/// Returns a width*height RGBA image. Pixels not touched by any run stay
/// fully transparent; compositing happens in a separate pass.
pub fn decode_layer(block: &LayerBlock, palette: &[Rgba<u8>]) -> Result<RgbaImage> {
    let width = block.width;
    let height = block.height;
    let total = width as usize * height as usize;
    let mut image = RgbaImage::new(width, height);
    if total == 0 {
        return Ok(image);
    }

    let default_color = lookup(palette, block.default_index as usize);
    let mut cursor = Cursor::new(&block.data);
    let mut drawn = 0usize;

    while cursor.remaining() > 0 {
        let control = cursor.read_u8("rle control byte")?;
        let run = (control >> 2) as usize;
        let command = control & 0x03;

        if drawn + run > total {
            return Err(ZarError::PixelCountMismatch {
                width,
                height,
                expected: total,
                actual: drawn + run,
            });
        }

        match command {
            0 => {
                // Skip run: advance the draw cursor only.
                drawn += run;
            }
            1 => {
                let indices = cursor.take(run, "rle index run")?;
                for &index in indices {
                    let mut color = lookup(palette, index as usize);
                    color[3] = 255;
                    put(&mut image, width, drawn, color);
                    drawn += 1;
                }
            }
            2 => {
                let pairs = cursor.take(run * 2, "rle index/alpha run")?;
                for pair in pairs.chunks_exact(2) {
                    let mut color = lookup(palette, pair[0] as usize);
                    color[3] = pair[1];
                    put(&mut image, width, drawn, color);
                    drawn += 1;
                }
            }
            _ => {
                let alphas = cursor.take(run, "rle alpha run")?;
                for &alpha in alphas {
                    let mut color = default_color;
                    color[3] = alpha;
                    put(&mut image, width, drawn, color);
                    drawn += 1;
                }
            }
        }
    }

    if drawn != total {
        return Err(ZarError::PixelCountMismatch {
            width,
            height,
            expected: total,
            actual: drawn,
        });
    }
    Ok(image)
}

fn lookup(palette: &[Rgba<u8>], index: usize) -> Rgba<u8> {
    match palette.get(index) {
        Some(color) => *color,
        None => {
            log::warn!(
                "palette index {index} out of range ({} entries), painting magenta",
                palette.len()
            );
            MAGENTA
        }
    }
}

fn put(image: &mut RgbaImage, width: u32, pixel: usize, color: Rgba<u8>) {
    let x = (pixel as u32) % width;
    let y = (pixel as u32) / width;
    image.put_pixel(x, y, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(width: u32, height: u32, default_index: u8, data: Vec<u8>) -> LayerBlock {
        LayerBlock {
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            subtype: BlockSubtype::Keyed,
            default_index,
            data,
        }
    }

    fn control(run: u8, command: u8) -> u8 {
        (run << 2) | command
    }

    /// Test-only encoder covering the four command kinds. Pixels must be
    /// expressible in the palette: fully transparent (skip), an exact
    /// opaque palette color (index run), a palette color with alpha
    /// (index/alpha run), or the default entry's RGB with alpha (alpha
    /// run). Runs are capped at the 6-bit maximum.
    fn encode(image: &RgbaImage, palette: &[Rgba<u8>], default_index: u8) -> Vec<u8> {
        #[derive(PartialEq, Clone, Copy)]
        enum Kind {
            Skip,
            Opaque,
            Blended,
            Keyed,
        }

        let classify = |p: &Rgba<u8>| -> (Kind, u8, u8) {
            if p[3] == 0 {
                return (Kind::Skip, 0, 0);
            }
            let rgb = |c: &Rgba<u8>| [c[0], c[1], c[2]];
            let default = &palette[default_index as usize];
            if p[3] != 255 && rgb(p) == rgb(default) {
                return (Kind::Keyed, 0, p[3]);
            }
            let index = palette
                .iter()
                .position(|c| rgb(c) == rgb(p))
                .expect("pixel color not in palette") as u8;
            if p[3] == 255 {
                (Kind::Opaque, index, 255)
            } else {
                (Kind::Blended, index, p[3])
            }
        };

        let mut out = Vec::new();
        let pixels: Vec<(Kind, u8, u8)> = image.pixels().map(classify).collect();
        let mut i = 0;
        while i < pixels.len() {
            let kind = pixels[i].0;
            let mut run = 1usize;
            while i + run < pixels.len() && pixels[i + run].0 == kind && run < 63 {
                run += 1;
            }
            let command = match kind {
                Kind::Skip => 0,
                Kind::Opaque => 1,
                Kind::Blended => 2,
                Kind::Keyed => 3,
            };
            out.push(control(run as u8, command));
            for &(_, index, alpha) in &pixels[i..i + run] {
                match kind {
                    Kind::Skip => {}
                    Kind::Opaque => out.push(index),
                    Kind::Blended => {
                        out.push(index);
                        out.push(alpha);
                    }
                    Kind::Keyed => out.push(alpha),
                }
            }
            i += run;
        }
        out
    }

    #[test]
    fn keyed_run_paints_default_entry() {
        // Subtype '4' block: 2-entry palette, default index 1, one control
        // byte (run=4, cmd=3) plus four opaque alphas.
        let palette = vec![Rgba([255, 0, 0, 255]), Rgba([0, 255, 0, 255])];
        let mut data = vec![control(4, 3)];
        data.extend_from_slice(&[255, 255, 255, 255]);

        let image = decode_layer(&block(4, 1, 1, data), &palette).unwrap();
        for x in 0..4 {
            assert_eq!(*image.get_pixel(x, 0), Rgba([0, 255, 0, 255]));
        }
    }

    #[test]
    fn skip_run_never_writes() {
        let palette = vec![Rgba([10, 20, 30, 255])];
        // skip 3, paint 1 opaque index 0.
        let data = vec![control(3, 0), control(1, 1), 0];
        let image = decode_layer(&block(4, 1, 0, data), &palette).unwrap();
        for x in 0..3 {
            assert_eq!(*image.get_pixel(x, 0), Rgba([0, 0, 0, 0]));
        }
        assert_eq!(*image.get_pixel(3, 0), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn index_alpha_pairs_carry_their_alpha() {
        let palette = vec![Rgba([1, 2, 3, 255]), Rgba([4, 5, 6, 255])];
        let data = vec![control(2, 2), 0, 128, 1, 7];
        let image = decode_layer(&block(2, 1, 0, data), &palette).unwrap();
        assert_eq!(*image.get_pixel(0, 0), Rgba([1, 2, 3, 128]));
        assert_eq!(*image.get_pixel(1, 0), Rgba([4, 5, 6, 7]));
    }

    #[test]
    fn short_stream_is_pixel_count_mismatch() {
        let palette = vec![Rgba([1, 2, 3, 255])];
        let data = vec![control(2, 1), 0, 0];
        match decode_layer(&block(2, 2, 0, data), &palette).unwrap_err() {
            ZarError::PixelCountMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overlong_run_is_pixel_count_mismatch() {
        let palette = vec![Rgba([1, 2, 3, 255])];
        let data = vec![control(5, 1), 0, 0, 0, 0, 0];
        assert!(matches!(
            decode_layer(&block(2, 2, 0, data), &palette).unwrap_err(),
            ZarError::PixelCountMismatch { actual: 5, .. }
        ));
    }

    #[test]
    fn missing_run_payload_is_truncated_data() {
        let palette = vec![Rgba([1, 2, 3, 255])];
        let data = vec![control(4, 1), 0];
        assert!(matches!(
            decode_layer(&block(2, 2, 0, data), &palette).unwrap_err(),
            ZarError::TruncatedData { .. }
        ));
    }

    #[test]
    fn out_of_range_index_paints_magenta() {
        let palette = vec![Rgba([1, 2, 3, 255])];
        let data = vec![control(1, 1), 9];
        let image = decode_layer(&block(1, 1, 0, data), &palette).unwrap();
        assert_eq!(*image.get_pixel(0, 0), MAGENTA);
    }

    #[test]
    fn round_trips_a_mixed_buffer() {
        let palette = vec![
            Rgba([255, 0, 0, 255]),
            Rgba([0, 255, 0, 255]),
            Rgba([0, 0, 255, 255]),
        ];
        let default_index = 2;
        let mut image = RgbaImage::new(8, 3);
        for (i, pixel) in image.pixels_mut().enumerate() {
            *pixel = match i % 5 {
                0 => Rgba([0, 0, 0, 0]),
                1 => Rgba([255, 0, 0, 255]),
                2 => Rgba([0, 255, 0, 255]),
                3 => Rgba([255, 0, 0, 140]),
                _ => Rgba([0, 0, 255, 60]), // default entry's RGB, keyed alpha
            };
        }

        let data = encode(&image, &palette, default_index);
        let decoded = decode_layer(
            &block(8, 3, default_index, data),
            &palette,
        )
        .unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn round_trips_runs_longer_than_one_control_byte() {
        let palette = vec![Rgba([9, 9, 9, 255])];
        let image = RgbaImage::from_pixel(100, 1, Rgba([9, 9, 9, 255]));
        let data = encode(&image, &palette, 0);
        let decoded = decode_layer(&block(100, 1, 0, data), &palette).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn subtype_byte_mapping() {
        assert_eq!(BlockSubtype::from_byte(0x33), BlockSubtype::Plain);
        assert_eq!(BlockSubtype::from_byte(0x34), BlockSubtype::Keyed);
        // Out-of-range values recover to Plain.
        assert_eq!(BlockSubtype::from_byte(0x00), BlockSubtype::Plain);
    }
}
