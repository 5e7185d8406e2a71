// Pixel-level passes: normalization of native-format scanlines into the
// canonical RGBA layout, and the sprite/mask alpha merge with grid-border
// seam suppression.

use crate::{ColorType, DecodeError, DecodedImage};

// Luminance-to-alpha curve. AI-generated masks tend to render "solid"
// regions as light grey rather than pure white, so everything at or above
// OPAQUE_THRESHOLD saturates to fully opaque and the remainder is squared
// to push mid-greys down. Values under TRANSPARENT_CUTOFF are noise.
const OPAQUE_THRESHOLD: u8 = 128;
const TRANSPARENT_CUTOFF: u8 = 20;

/// Map reconstructed native-format scanlines into the canonical 4-channel
/// layout. The variant is matched once per image, not per byte.
pub(crate) fn to_rgba(scanlines: &[u8], color_type: ColorType) -> Result<Vec<u8>, DecodeError> {
    let pixels = match color_type {
        ColorType::Gray => scanlines.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        ColorType::Rgb => scanlines
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        ColorType::GrayAlpha => scanlines
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        ColorType::Rgba => scanlines.to_vec(),
        // stride is declared for Indexed but there is no palette path
        ColorType::Indexed => {
            return Err(DecodeError::UnsupportedColorType(ColorType::Indexed.tag()))
        }
    };
    Ok(pixels)
}

/// Logical tiling of a sheet into `grid_size` x `grid_size` equal cells,
/// with a forced-transparent margin of `border_width` pixels at every cell
/// edge to hide generation seams between tiles.
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    pub grid_size: u32,
    pub cell_width: f64,
    pub cell_height: f64,
    pub border_width: u32,
}

impl GridGeometry {
    pub fn new(width: u32, height: u32, grid_size: u32, border_width: u32) -> GridGeometry {
        let cells = grid_size.max(1);
        GridGeometry {
            grid_size: cells,
            cell_width: width as f64 / cells as f64,
            cell_height: height as f64 / cells as f64,
            border_width,
        }
    }

    /// Whether `(x, y)` falls within the suppressed margin of its cell.
    pub fn is_border(&self, x: u32, y: u32) -> bool {
        let margin = self.border_width as f64;
        let cx = x as f64 % self.cell_width;
        let cy = y as f64 % self.cell_height;
        cx < margin
            || cy < margin
            || cx >= self.cell_width - margin
            || cy >= self.cell_height - margin
    }
}

/// Merge a decoded sprite sheet with a decoded luminance mask.
///
/// RGB comes from the sprite unchanged; alpha is derived from the mask's
/// per-pixel luminance through the saturating curve, except inside cell
/// borders where it is forced to zero. A mask with different dimensions is
/// tolerated: the sprite's dimensions win, and mask lookups past the end of
/// its buffer fall back to fully opaque.
pub fn composite(
    sprite: &DecodedImage,
    mask: &DecodedImage,
    grid_size: u32,
    border_width: u32,
) -> DecodedImage {
    if sprite.width != mask.width || sprite.height != mask.height {
        log::warn!(
            "mask dimensions {}x{} differ from sprite {}x{}, compositing over sprite bounds",
            mask.width,
            mask.height,
            sprite.width,
            sprite.height
        );
    }

    let grid = GridGeometry::new(sprite.width, sprite.height, grid_size, border_width);
    let mut pixels = vec![0u8; sprite.pixels.len()];

    for y in 0..sprite.height {
        for x in 0..sprite.width {
            let offset = (y as usize * sprite.width as usize + x as usize) * 4;
            pixels[offset..offset + 3].copy_from_slice(&sprite.pixels[offset..offset + 3]);
            pixels[offset + 3] = if grid.is_border(x, y) {
                0
            } else {
                mask_alpha(&mask.pixels, offset)
            };
        }
    }

    DecodedImage {
        width: sprite.width,
        height: sprite.height,
        bit_depth: 8,
        color_type: ColorType::Rgba,
        pixels,
    }
}

// alpha for one sprite pixel, read from the mask at the same byte offset
fn mask_alpha(mask_pixels: &[u8], offset: usize) -> u8 {
    if offset + 3 > mask_pixels.len() {
        return 255;
    }
    let sum = mask_pixels[offset] as u32
        + mask_pixels[offset + 1] as u32
        + mask_pixels[offset + 2] as u32;
    let luminance = (sum as f64 / 3.0).round() as u8;
    luminance_to_alpha(luminance)
}

pub(crate) fn luminance_to_alpha(luminance: u8) -> u8 {
    if luminance >= OPAQUE_THRESHOLD {
        return 255;
    }
    let t = luminance as f64 / 127.0;
    let curved = t * t;
    let alpha = (curved * 255.0).round() as u8;
    if alpha < TRANSPARENT_CUTOFF {
        0
    } else {
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(width: u32, height: u32, pixel: [u8; 4]) -> DecodedImage {
        DecodedImage {
            width,
            height,
            bit_depth: 8,
            color_type: ColorType::Rgba,
            pixels: pixel
                .iter()
                .copied()
                .cycle()
                .take((width * height * 4) as usize)
                .collect(),
        }
    }

    #[test]
    fn gray_normalizes_to_opaque_rgba() {
        assert_eq!(
            to_rgba(&[7, 200], ColorType::Gray).unwrap(),
            [7, 7, 7, 255, 200, 200, 200, 255]
        );
    }

    #[test]
    fn rgb_normalizes_to_opaque_rgba() {
        assert_eq!(
            to_rgba(&[1, 2, 3, 4, 5, 6], ColorType::Rgb).unwrap(),
            [1, 2, 3, 255, 4, 5, 6, 255]
        );
    }

    #[test]
    fn gray_alpha_keeps_its_alpha() {
        assert_eq!(
            to_rgba(&[9, 40], ColorType::GrayAlpha).unwrap(),
            [9, 9, 9, 40]
        );
    }

    #[test]
    fn rgba_passes_through() {
        assert_eq!(
            to_rgba(&[1, 2, 3, 4], ColorType::Rgba).unwrap(),
            [1, 2, 3, 4]
        );
    }

    #[test]
    fn indexed_has_no_normalization_path() {
        assert_eq!(
            to_rgba(&[0], ColorType::Indexed).unwrap_err(),
            DecodeError::UnsupportedColorType(3)
        );
    }

    #[test]
    fn alpha_curve_literal_cases() {
        assert_eq!(luminance_to_alpha(255), 255);
        assert_eq!(luminance_to_alpha(128), 255);
        assert_eq!(luminance_to_alpha(127), 255); // t = 1.0 exactly
        assert_eq!(luminance_to_alpha(64), 65);
        assert_eq!(luminance_to_alpha(36), 20); // first value above the cutoff
        assert_eq!(luminance_to_alpha(35), 0);
        assert_eq!(luminance_to_alpha(10), 0);
        assert_eq!(luminance_to_alpha(0), 0);
    }

    #[test]
    fn sheet_border_classification() {
        // 1536x1536 sheet, 3x3 grid -> 512x512 cells, 4px margin
        let grid = GridGeometry::new(1536, 1536, 3, 4);
        assert!(grid.is_border(0, 0));
        assert!(grid.is_border(509, 0));
        assert!(grid.is_border(509, 256));
        assert!(grid.is_border(512, 256)); // first column of the second cell
        assert!(!grid.is_border(256, 256));
        assert!(!grid.is_border(507, 256));
    }

    #[test]
    fn zero_margin_suppresses_nothing() {
        let grid = GridGeometry::new(12, 12, 3, 0);
        assert!(!grid.is_border(0, 0));
        assert!(!grid.is_border(3, 11));
    }

    #[test]
    fn composite_forces_border_transparent() {
        // 12x12, 3x3 grid -> 4px cells, 1px margin; white mask everywhere
        let sprite = rgba(12, 12, [10, 20, 30, 255]);
        let mask = rgba(12, 12, [255, 255, 255, 255]);
        let merged = composite(&sprite, &mask, 3, 1);

        let pixel = |x: u32, y: u32| {
            let o = ((y * 12 + x) * 4) as usize;
            <[u8; 4]>::try_from(&merged.pixels[o..o + 4]).unwrap()
        };
        assert_eq!(pixel(0, 0), [10, 20, 30, 0]);
        assert_eq!(pixel(3, 5), [10, 20, 30, 0]);
        assert_eq!(pixel(1, 1), [10, 20, 30, 255]);
        assert_eq!(pixel(5, 6), [10, 20, 30, 255]);
    }

    #[test]
    fn composite_applies_mask_curve_in_cell_interiors() {
        let sprite = rgba(12, 12, [1, 2, 3, 255]);
        let mask = rgba(12, 12, [64, 64, 64, 255]);
        let merged = composite(&sprite, &mask, 3, 1);
        let o = ((1 * 12 + 1) * 4) as usize;
        assert_eq!(&merged.pixels[o..o + 4], &[1, 2, 3, 65]);
    }

    #[test]
    fn composite_tolerates_smaller_mask() {
        let sprite = rgba(4, 4, [5, 5, 5, 255]);
        let mask = rgba(2, 2, [0, 0, 0, 255]);
        let merged = composite(&sprite, &mask, 1, 0);

        assert_eq!(merged.width, 4);
        assert_eq!(merged.height, 4);
        // offsets inside the 2x2 mask buffer read black -> transparent
        assert_eq!(merged.pixels[3], 0);
        // offsets past the mask buffer fall back to fully opaque
        let last = ((3 * 4 + 3) * 4) as usize;
        assert_eq!(merged.pixels[last + 3], 255);
    }
}
