//! Multi-layer frame compositing.
//!
//! Compositing is a separate phase from layer decode: each populated zar
//! slot is first RLE-decoded against its layer's palette column, then
//! src-over blended onto the collection's canvas in ascending layer order
//! (body first, overlays on top).

use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::palette::Palette;
use crate::rle::{self, LayerBlock};

/// Composite the layer stack of one (frame, direction) cell.
///
/// `layers` holds one optional block per render layer, bottom to top.
/// Block offsets are absolute in the sprite's coordinate space; `origin`
/// translates them onto the canvas.
pub fn composite_cell(
    canvas: (u32, u32),
    origin: (i32, i32),
    layers: &[Option<LayerBlock>],
    palette: &Palette,
) -> Result<RgbaImage> {
    let mut frame = RgbaImage::new(canvas.0, canvas.1);
    for (layer_index, slot) in layers.iter().enumerate() {
        let Some(block) = slot else { continue };
        let decoded = rle::decode_layer(block, palette.column(layer_index))?;
        blend_at(
            &mut frame,
            &decoded,
            i64::from(block.x_offset) - i64::from(origin.0),
            i64::from(block.y_offset) - i64::from(origin.1),
        );
    }
    Ok(frame)
}

/// Src-over blend `src` onto `dst` with its top-left at (dx, dy).
/// Pixels falling outside the canvas are clipped.
pub fn blend_at(dst: &mut RgbaImage, src: &RgbaImage, dx: i64, dy: i64) {
    for (x, y, pixel) in src.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let tx = dx + i64::from(x);
        let ty = dy + i64::from(y);
        if tx < 0 || ty < 0 || tx >= i64::from(dst.width()) || ty >= i64::from(dst.height()) {
            continue;
        }
        let (tx, ty) = (tx as u32, ty as u32);
        let blended = over(*pixel, *dst.get_pixel(tx, ty));
        dst.put_pixel(tx, ty, blended);
    }
}

/// Standard non-premultiplied src-over for 8-bit channels.
fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = u32::from(src[3]);
    let da = u32::from(dst[3]);
    if sa == 255 || da == 0 {
        return src;
    }

    let out_a = sa + da * (255 - sa) / 255;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| -> u8 {
        let s = u32::from(s);
        let d = u32::from(d);
        ((s * sa + d * da * (255 - sa) / 255) / out_a) as u8
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        out_a as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::BlockSubtype;

    fn opaque(r: u8, g: u8, b: u8) -> Rgba<u8> {
        Rgba([r, g, b, 255])
    }

    #[test]
    fn opaque_source_replaces_destination() {
        assert_eq!(
            over(opaque(9, 8, 7), opaque(1, 2, 3)),
            opaque(9, 8, 7)
        );
    }

    #[test]
    fn transparent_destination_takes_source() {
        let src = Rgba([10, 20, 30, 128]);
        assert_eq!(over(src, Rgba([0, 0, 0, 0])), src);
    }

    #[test]
    fn half_alpha_blends_toward_source() {
        let out = over(Rgba([255, 0, 0, 128]), opaque(0, 0, 255));
        assert_eq!(out[3], 255);
        assert!(out[0] > 120 && out[0] < 136, "red {}", out[0]);
        assert!(out[2] > 120 && out[2] < 136, "blue {}", out[2]);
    }

    #[test]
    fn blend_clips_out_of_canvas_pixels() {
        let mut canvas = RgbaImage::new(2, 2);
        let src = RgbaImage::from_pixel(2, 2, opaque(5, 5, 5));
        blend_at(&mut canvas, &src, -1, -1);
        assert_eq!(*canvas.get_pixel(0, 0), opaque(5, 5, 5));
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn layers_stack_bottom_to_top() {
        // Layer 0 paints both pixels red, layer 1 paints the second green.
        let palette = Palette::new(vec![
            vec![opaque(255, 0, 0)],
            vec![opaque(0, 255, 0)],
        ]);
        let bottom = LayerBlock {
            width: 2,
            height: 1,
            x_offset: 0,
            y_offset: 0,
            subtype: BlockSubtype::Plain,
            default_index: 0,
            data: vec![(2 << 2) | 1, 0, 0],
        };
        let top = LayerBlock {
            width: 1,
            height: 1,
            x_offset: 1,
            y_offset: 0,
            subtype: BlockSubtype::Plain,
            default_index: 0,
            data: vec![(1 << 2) | 1, 0],
        };

        let frame =
            composite_cell((2, 1), (0, 0), &[Some(bottom), Some(top)], &palette).unwrap();
        assert_eq!(*frame.get_pixel(0, 0), opaque(255, 0, 0));
        assert_eq!(*frame.get_pixel(1, 0), opaque(0, 255, 0));
    }

    #[test]
    fn vacant_slots_leave_the_canvas_untouched() {
        let palette = Palette::single(vec![opaque(1, 1, 1)]);
        let frame = composite_cell((3, 3), (0, 0), &[None, None], &palette).unwrap();
        assert!(frame.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }
}
