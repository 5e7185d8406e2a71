// zlib container handling around the raw DEFLATE body. The compressed
// payload is [2-byte header][deflate stream][4-byte Adler-32]; the header
// and trailer are ours, the DEFLATE coding itself is miniz_oxide's.

use crate::checksum::adler32;
use crate::DecodeError;

// CMF/FLG pair for deflate with a 32K window, default compression
const ZLIB_HEADER: [u8; 2] = [0x78, 0x9C];

const COMPRESSION_LEVEL: u8 = 6;

/// Strip the zlib framing and inflate the raw scanline bytes.
///
/// The trailing Adler-32 is discarded without verification; corruption
/// surfaces as an inflate failure or as a scanline-length mismatch
/// downstream.
pub(crate) fn unwrap_zlib(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if payload.len() < ZLIB_HEADER.len() + 4 {
        return Err(DecodeError::CorruptStream);
    }
    let body = &payload[ZLIB_HEADER.len()..payload.len() - 4];
    miniz_oxide::inflate::decompress_to_vec(body).map_err(|_| DecodeError::CorruptStream)
}

/// Deflate raw scanline bytes and wrap them in the zlib container,
/// computing the Adler-32 over the uncompressed input.
pub(crate) fn wrap_zlib(raw: &[u8]) -> Vec<u8> {
    let compressed = miniz_oxide::deflate::compress_to_vec(raw, COMPRESSION_LEVEL);
    let mut payload = Vec::with_capacity(ZLIB_HEADER.len() + compressed.len() + 4);
    payload.extend_from_slice(&ZLIB_HEADER);
    payload.extend_from_slice(&compressed);
    payload.extend_from_slice(&adler32(raw).to_be_bytes());
    payload
}
