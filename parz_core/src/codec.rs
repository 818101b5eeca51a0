use std::io::Write;

use anyhow::Context;
use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

/// Worst-case compressed size for `raw_len` input bytes.
///
/// Mirrors zlib's `compressBound` slack (stored-block overhead plus the
/// stream wrapper) with extra headroom. The engine never produces a payload
/// larger than this, which is what makes pre-reserved, non-overlapping
/// block offsets possible.
pub fn compress_bound(raw_len: usize) -> usize {
    raw_len + raw_len / 1000 + 128
}

/// Compress one block at the given zlib level (0–9).
pub fn compress(raw: &[u8], level: u32) -> anyhow::Result<Vec<u8>> {
    let sink = Vec::with_capacity(compress_bound(raw.len()));
    let mut encoder = ZlibEncoder::new(sink, Compression::new(level));
    encoder.write_all(raw)?;
    let payload = encoder.finish().context("zlib compression failed")?;
    Ok(payload)
}

/// Decompress one block, enforcing that the output length matches the
/// descriptor's recorded original size. A length mismatch — like a broken
/// zlib stream — is treated as payload corruption.
pub fn decompress(payload: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(Vec::with_capacity(expected_len));
    decoder
        .write_all(payload)
        .context("zlib stream is corrupt")?;
    let raw = decoder.finish().context("zlib stream is corrupt")?;
    if raw.len() != expected_len {
        anyhow::bail!(
            "decompressed to {} bytes but descriptor records {}",
            raw.len(),
            expected_len
        );
    }
    Ok(raw)
}
