//! Pixel data compression and decompression handling.
//!
//! Image payloads are stored as LZ4 blocks without a length prefix of their
//! own; the blob entry records both the compressed and the raw length, so the
//! decoder allocates its output buffer up front.

use lz4_flex::block;
use tracing::instrument;

use crate::error::{Error, Result};

/// Safe upper bound on the compressed size of `raw_len` input bytes
pub fn max_compressed_len(raw_len: usize) -> usize {
    block::get_maximum_output_size(raw_len)
}

/// Compress pixel data, truncating the output buffer to the actual length
///
/// The output buffer is sized by [`max_compressed_len`], so the codec cannot
/// run out of space; a failure here means the input itself was rejected and
/// aborts the conversion.
#[instrument(skip(raw), fields(raw_len = raw.len()), err)]
pub fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; max_compressed_len(raw.len())];
    let written =
        block::compress_into(raw, &mut out).map_err(|e| Error::Compression(e.to_string()))?;
    out.truncate(written);
    Ok(out)
}

/// Decompress an LZ4 block back into `raw_len` bytes of pixel data
#[instrument(skip(compressed), fields(compressed_len = compressed.len()), err)]
pub fn decompress(compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
    block::decompress(compressed, raw_len).map_err(|e| Error::Compression(e.to_string()))
}
