//! Zlib container for on-disk object records.
//!
//! A record is the framed object wrapped in a zlib stream (2-byte header,
//! DEFLATE body, Adler-32 trailer). The trailer is what catches corruption
//! on read.

use crate::{Result, StorageError};
use flate2::write::ZlibEncoder;
use flate2::{Decompress, FlushDecompress, Status};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// No compression (stored blocks, still zlib framed)
    None,
    /// Fast compression (lower ratio)
    Fast,
    /// Default compression (balanced)
    #[default]
    Default,
    /// Best compression (slower, higher ratio)
    Best,
}

impl CompressionLevel {
    /// Converts to flate2 compression level.
    pub fn to_flate2(self) -> flate2::Compression {
        match self {
            CompressionLevel::None => flate2::Compression::none(),
            CompressionLevel::Fast => flate2::Compression::fast(),
            CompressionLevel::Default => flate2::Compression::default(),
            CompressionLevel::Best => flate2::Compression::best(),
        }
    }
}

/// Wraps framed object bytes in a zlib stream.
pub fn compress(framed: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level.to_flate2());
    encoder.write_all(framed)?;
    Ok(encoder.finish()?)
}

/// Reverses [`compress`].
///
/// A checksum mismatch, truncated stream, invalid DEFLATE data, or bytes
/// after the end of the stream are reported as
/// [`StorageError::CorruptObject`].
pub fn decompress(record: &[u8]) -> Result<Vec<u8>> {
    let (framed, consumed) = inflate(record, record.len().saturating_mul(2))?;
    if consumed != record.len() {
        return Err(StorageError::CorruptObject(format!(
            "{} trailing bytes after end of zlib stream",
            record.len() - consumed
        )));
    }
    Ok(framed)
}

/// Inflates one zlib stream from the front of `input`.
///
/// Returns the decompressed bytes and the number of input bytes the stream
/// occupied, so a caller walking a concatenation of streams can resume
/// right after it. The stream's end marker is authoritative: `size_hint`
/// only sizes the first allocation. Input that ends before the end marker
/// is an error.
pub fn inflate(input: &[u8], size_hint: usize) -> Result<(Vec<u8>, usize)> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(size_hint.clamp(64, 1 << 24));

    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }

        let in_before = inflater.total_in() as usize;
        let out_before = out.len();

        // FlushDecompress::None lets the output buffer grow between calls.
        let status = inflater
            .decompress_vec(&input[in_before..], &mut out, FlushDecompress::None)
            .map_err(|e| StorageError::CorruptObject(e.to_string()))?;

        if status == Status::StreamEnd {
            return Ok((out, inflater.total_in() as usize));
        }

        let stalled = inflater.total_in() as usize == in_before && out.len() == out_before;
        if stalled && out.len() < out.capacity() {
            return Err(StorageError::CorruptObject(format!(
                "zlib stream truncated after {} input bytes",
                in_before
            )));
        }
    }
}
