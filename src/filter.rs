// Scanline filter engine. Decompressed pixel data is `height` rows of
// [filter byte][width * bpp data bytes]; each row is reconstructed against
// the previous reconstructed row at its native byte stride. Reconstruction
// byte distances (`bpp`) come from ColorType::bytes_per_pixel.

use crate::DecodeError;

pub(crate) const FILTER_NONE: u8 = 0;
pub(crate) const FILTER_SUB: u8 = 1;
pub(crate) const FILTER_UP: u8 = 2;
pub(crate) const FILTER_AVERAGE: u8 = 3;
pub(crate) const FILTER_PAETH: u8 = 4;

/// Reverse per-row filtering over the whole inflated stream, yielding
/// native-stride pixel rows with the filter bytes removed.
pub(crate) fn reconstruct(
    raw: &[u8],
    width: u32,
    height: u32,
    bpp: usize,
) -> Result<Vec<u8>, DecodeError> {
    let stride = width as usize * bpp;
    let expected = (stride + 1) * height as usize;
    if raw.len() < expected {
        return Err(DecodeError::ScanlineMismatch {
            expected,
            found: raw.len(),
        });
    }

    let mut pixels = vec![0u8; stride * height as usize];
    for y in 0..height as usize {
        let row = &raw[y * (stride + 1)..(y + 1) * (stride + 1)];
        let (filter, src) = (row[0], &row[1..]);

        let (done, rest) = pixels.split_at_mut(y * stride);
        let prev = &done[done.len().saturating_sub(stride)..];
        unfilter_row(filter, src, prev, &mut rest[..stride], bpp)?;
    }
    Ok(pixels)
}

// `src` is the filtered row, `prev` the reconstructed row above (empty for
// the first row), `dst` the output. a = left, b = up, c = up-left, all at
// `bpp` byte distance.
fn unfilter_row(
    filter: u8,
    src: &[u8],
    prev: &[u8],
    dst: &mut [u8],
    bpp: usize,
) -> Result<(), DecodeError> {
    match filter {
        FILTER_NONE => dst.copy_from_slice(src),
        FILTER_SUB => {
            for x in 0..src.len() {
                let a = if x >= bpp { dst[x - bpp] } else { 0 };
                dst[x] = src[x].wrapping_add(a);
            }
        }
        FILTER_UP => {
            for x in 0..src.len() {
                let b = prev.get(x).copied().unwrap_or(0);
                dst[x] = src[x].wrapping_add(b);
            }
        }
        FILTER_AVERAGE => {
            for x in 0..src.len() {
                let a = if x >= bpp { dst[x - bpp] as u16 } else { 0 };
                let b = prev.get(x).copied().unwrap_or(0) as u16;
                dst[x] = src[x].wrapping_add(((a + b) / 2) as u8);
            }
        }
        FILTER_PAETH => {
            for x in 0..src.len() {
                let a = if x >= bpp { dst[x - bpp] } else { 0 };
                let b = prev.get(x).copied().unwrap_or(0);
                let c = if x >= bpp {
                    prev.get(x - bpp).copied().unwrap_or(0)
                } else {
                    0
                };
                dst[x] = src[x].wrapping_add(paeth(a, b, c));
            }
        }
        other => return Err(DecodeError::InvalidFilter(other)),
    }
    Ok(())
}

// closest of a/b/c to the a + b - c estimate, ties resolved a, then b
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (pa, pb, pc) = (a as i32, b as i32, c as i32);
    let p = pa + pb - pc;
    let da = (p - pa).abs();
    let db = (p - pb).abs();
    let dc = (p - pc).abs();
    if da <= db && da <= dc {
        a
    } else if db <= dc {
        b
    } else {
        c
    }
}

/// Prefix every scanline with filter type None for re-encoding; no per-row
/// filtering is applied on the encode path.
pub(crate) fn apply_none(pixels: &[u8], stride: usize) -> Vec<u8> {
    let rows = pixels.len() / stride.max(1);
    let mut raw = Vec::with_capacity((stride + 1) * rows);
    for row in pixels.chunks_exact(stride) {
        raw.push(FILTER_NONE);
        raw.extend_from_slice(row);
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_row(filter: u8, src: &[u8], prev: &[u8], bpp: usize) -> Vec<u8> {
        let mut dst = vec![0u8; src.len()];
        unfilter_row(filter, src, prev, &mut dst, bpp).unwrap();
        dst
    }

    #[test]
    fn sub_reconstruction() {
        assert_eq!(one_row(FILTER_SUB, &[1, 2, 3], &[], 1), [1, 3, 6]);
        // bpp 4: the left neighbour is one whole pixel back
        assert_eq!(
            one_row(FILTER_SUB, &[10, 20, 30, 40, 1, 2, 3, 4], &[], 4),
            [10, 20, 30, 40, 11, 22, 33, 44]
        );
    }

    #[test]
    fn up_reconstruction() {
        assert_eq!(one_row(FILTER_UP, &[1, 2, 3], &[10, 20, 30], 1), [11, 22, 33]);
        // first row: b is 0 everywhere
        assert_eq!(one_row(FILTER_UP, &[1, 2, 3], &[], 1), [1, 2, 3]);
    }

    #[test]
    fn average_reconstruction() {
        // x0: (0+2)/2=1 -> 2; x1: (2+4)/2=3 -> 5; x2: (5+6)/2=5 -> 8
        assert_eq!(one_row(FILTER_AVERAGE, &[1, 2, 3], &[2, 4, 6], 1), [2, 5, 8]);
    }

    #[test]
    fn paeth_reconstruction() {
        // x0: a=0 b=4 c=0, p=4 -> picks b -> 5
        // x1: a=5 b=5 c=4, p=6 -> picks a -> 7
        // x2: a=7 b=6 c=5, p=8 -> picks a -> 10
        assert_eq!(one_row(FILTER_PAETH, &[1, 2, 3], &[4, 5, 6], 1), [5, 7, 10]);
    }

    #[test]
    fn paeth_predictor_tie_breaking() {
        assert_eq!(paeth(0, 0, 0), 0);
        assert_eq!(paeth(1, 2, 1), 2); // p=2: ties on b
        assert_eq!(paeth(9, 9, 9), 9);
    }

    #[test]
    fn mixed_filters_across_rows() {
        // 2x2 single-channel image: row 0 Sub, row 1 Up
        let raw = [FILTER_SUB, 5, 3, FILTER_UP, 1, 1];
        assert_eq!(reconstruct(&raw, 2, 2, 1).unwrap(), [5, 8, 6, 9]);
    }

    #[test]
    fn short_stream_is_rejected() {
        let err = reconstruct(&[0, 1, 2], 2, 2, 1).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ScanlineMismatch {
                expected: 6,
                found: 3
            }
        );
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let raw = [9u8, 1, 2];
        assert_eq!(
            reconstruct(&raw, 2, 1, 1).unwrap_err(),
            DecodeError::InvalidFilter(9)
        );
    }

    #[test]
    fn filter_none_round_trip() {
        let pixels = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let raw = apply_none(&pixels, 4);
        assert_eq!(raw, [0, 1, 2, 3, 4, 0, 5, 6, 7, 8]);
        assert_eq!(reconstruct(&raw, 1, 2, 4).unwrap(), pixels);
    }
}
