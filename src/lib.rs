// PNG codec and alpha-compositing pipeline for AI-generated sprite sheets.
// Decodes a PNG buffer to canonical RGBA, derives alpha for a sprite sheet
// from a second decoded image (a luminance mask), suppresses grid-cell seam
// borders, and re-encodes to PNG. Interlaced and indexed-palette images are
// rejected; bit depth is 8 only. DEFLATE coding is delegated to miniz_oxide.

use winnow::binary::be_u32;
use winnow::token::take;
use winnow::Parser;

mod checksum;
mod compression;
mod filter;
mod image;

pub use image::{composite, GridGeometry};

/// Cells per sheet axis unless the caller says otherwise.
pub const DEFAULT_GRID_SIZE: u32 = 3;
/// Suppressed margin around each cell, in pixels.
pub const DEFAULT_BORDER_WIDTH: u32 = 4;

const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Gray,
    Rgb,
    Indexed,
    GrayAlpha,
    Rgba,
}

impl ColorType {
    fn from_tag(tag: u8) -> Result<ColorType, DecodeError> {
        match tag {
            0 => Ok(ColorType::Gray),
            2 => Ok(ColorType::Rgb),
            3 => Ok(ColorType::Indexed),
            4 => Ok(ColorType::GrayAlpha),
            6 => Ok(ColorType::Rgba),
            other => Err(DecodeError::UnsupportedColorType(other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ColorType::Gray => 0,
            ColorType::Rgb => 2,
            ColorType::Indexed => 3,
            ColorType::GrayAlpha => 4,
            ColorType::Rgba => 6,
        }
    }

    /// Filter-reconstruction byte stride. Indexed carries a stride but has
    /// no decode path; see [`DecodeError::UnsupportedColorType`].
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Gray => 1,
            ColorType::Rgb => 3,
            ColorType::Indexed => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgba => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    InvalidSignature,
    MissingHeader,
    UnsupportedColorType(u8),
    UnsupportedBitDepth(u8),
    UnsupportedInterlace,
    TruncatedChunk,
    InvalidFilter(u8),
    CorruptStream,
    ScanlineMismatch { expected: usize, found: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidSignature => write!(f, "invalid signature"),
            DecodeError::MissingHeader => write!(f, "missing metadata chunk"),
            DecodeError::UnsupportedColorType(tag) => {
                write!(f, "unsupported color type {}", tag)
            }
            DecodeError::UnsupportedBitDepth(depth) => {
                write!(f, "unsupported bit depth {}", depth)
            }
            DecodeError::UnsupportedInterlace => write!(f, "interlaced images not supported"),
            DecodeError::TruncatedChunk => write!(f, "truncated chunk"),
            DecodeError::InvalidFilter(filter) => write!(f, "invalid scanline filter {}", filter),
            DecodeError::CorruptStream => write!(f, "corrupt compressed stream"),
            DecodeError::ScanlineMismatch { expected, found } => {
                write!(f, "scanline data mismatch: expected {expected} bytes, found {found}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// A decoded image in canonical form: 8-bit RGBA regardless of the source
/// color arrangement, `pixels.len() == width * height * 4`. `color_type`
/// records the arrangement the file was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub pixels: Vec<u8>,
}

struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: ColorType,
}

impl Header {
    const LEN: usize = 13;

    fn parse(data: &[u8]) -> Result<Header, DecodeError> {
        if data.len() < Header::LEN {
            return Err(DecodeError::TruncatedChunk);
        }
        let (next, width) = read_u32(data)?;
        let (_, height) = read_u32(next)?;
        let bit_depth = data[8];
        let color_type = ColorType::from_tag(data[9])?;
        let interlace = data[12];

        if bit_depth != 8 {
            return Err(DecodeError::UnsupportedBitDepth(bit_depth));
        }
        if color_type == ColorType::Indexed {
            return Err(DecodeError::UnsupportedColorType(color_type.tag()));
        }
        if interlace != 0 {
            return Err(DecodeError::UnsupportedInterlace);
        }
        Ok(Header {
            width,
            height,
            bit_depth,
            color_type,
        })
    }
}

impl DecodedImage {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    /// Decode a PNG byte buffer into canonical RGBA.
    pub fn decode(file_buf: &[u8]) -> Result<DecodedImage, DecodeError> {
        let (header, idat) = read_chunks(file_buf)?;
        let raw = compression::unwrap_zlib(&idat)?;
        let scanlines = filter::reconstruct(
            &raw,
            header.width,
            header.height,
            header.color_type.bytes_per_pixel(),
        )?;
        let pixels = image::to_rgba(&scanlines, header.color_type)?;
        Ok(DecodedImage {
            width: header.width,
            height: header.height,
            bit_depth: header.bit_depth,
            color_type: header.color_type,
            pixels,
        })
    }

    /// Wrap an existing canonical RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<DecodedImage, DecodeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::ScanlineMismatch {
                expected,
                found: pixels.len(),
            });
        }
        Ok(DecodedImage {
            width,
            height,
            bit_depth: 8,
            color_type: ColorType::Rgba,
            pixels,
        })
    }

    /// Re-encode to PNG bytes. Output is always 8-bit RGBA with unfiltered
    /// scanlines: signature, IHDR, one IDAT, IEND, each chunk CRC-trailed.
    pub fn encode(&self) -> Vec<u8> {
        let stride = self.width as usize * ColorType::Rgba.bytes_per_pixel();
        let raw = filter::apply_none(&self.pixels, stride);
        let payload = compression::wrap_zlib(&raw);

        let mut ihdr = Vec::with_capacity(Header::LEN);
        ihdr.extend_from_slice(&self.width.to_be_bytes());
        ihdr.extend_from_slice(&self.height.to_be_bytes());
        ihdr.push(8);
        ihdr.push(ColorType::Rgba.tag());
        ihdr.extend_from_slice(&[0, 0, 0]); // compression, filter, interlace

        let mut out = Vec::with_capacity(Self::SIGNATURE.len() + payload.len() + 3 * 12 + ihdr.len());
        out.extend_from_slice(&Self::SIGNATURE);
        push_chunk(&mut out, CHUNK_IHDR, &ihdr);
        push_chunk(&mut out, CHUNK_IDAT, &payload);
        push_chunk(&mut out, CHUNK_IEND, &[]);
        out
    }
}

/// Decode a sprite sheet and a luminance mask, merge the mask into the
/// sheet's alpha channel with grid-border seam suppression, and re-encode.
/// The one-call form of the pipeline: byte buffer in, byte buffer out.
pub fn merge_alpha(
    sprite_buf: &[u8],
    mask_buf: &[u8],
    grid_size: u32,
    border_width: u32,
) -> Result<Vec<u8>, DecodeError> {
    let sprite = DecodedImage::decode(sprite_buf)?;
    let mask = DecodedImage::decode(mask_buf)?;
    Ok(composite(&sprite, &mask, grid_size, border_width).encode())
}

// Walk the chunk sequence: signature, then [len][tag][data][crc] records.
// IHDR must precede any IDAT; IDAT payloads are concatenated in file order;
// IEND stops the walk and anything after it is ignored. Chunk CRCs are read
// past without verification; corruption surfaces downstream or not at all.
fn read_chunks(file_buf: &[u8]) -> Result<(Header, Vec<u8>), DecodeError> {
    let (mut rest, signature) =
        read_bytes(file_buf, DecodedImage::SIGNATURE.len()).map_err(|_| DecodeError::InvalidSignature)?;
    if signature != DecodedImage::SIGNATURE {
        return Err(DecodeError::InvalidSignature);
    }

    let mut header: Option<Header> = None;
    let mut idat: Vec<u8> = Vec::new();
    loop {
        let (next, length) = read_u32(rest)?;
        let (next, tag) = read_bytes(next, 4)?;
        let (next, data) = read_bytes(next, length as usize)?;
        let (next, _crc) = read_u32(next)?;

        if tag == CHUNK_IHDR {
            header = Some(Header::parse(data)?);
        } else if tag == CHUNK_IDAT {
            if header.is_none() {
                return Err(DecodeError::MissingHeader);
            }
            idat.extend_from_slice(data);
        } else if tag == CHUNK_IEND {
            break;
        }
        rest = next;
    }

    match header {
        Some(header) => Ok((header, idat)),
        None => Err(DecodeError::MissingHeader),
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: [u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&tag);
    out.extend_from_slice(data);
    out.extend_from_slice(&checksum::crc32(&tag, data).to_be_bytes());
}

fn read_u32(s: &[u8]) -> Result<(&[u8], u32), DecodeError> {
    be_u32
        .parse_peek(s)
        .map_err(|_: winnow::error::ErrMode<winnow::error::ErrorKind>| DecodeError::TruncatedChunk)
}

fn read_bytes(s: &[u8], count: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    take(count)
        .parse_peek(s)
        .map_err(|_: winnow::error::ErrMode<winnow::error::ErrorKind>| DecodeError::TruncatedChunk)
}
