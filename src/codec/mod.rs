//! Payload codec: every entry is stored as one zlib stream.
//!
//! The container format never records which codec produced a block; readers
//! assume zlib.  A payload that does not inflate is reported as
//! [`CodecError::CorruptPayload`], which is also how a truncated block, a
//! wrong offset in the footer, or a foreign format version shows up.
//!
//! # Level
//! Existing game archives are packed at zlib level 1.  Any level
//! decodes with the same inflater, so the level is a write-side choice only.

use std::io::{self, Write};

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use thiserror::Error;

/// zlib level used when nothing else is configured.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 1;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(#[source] io::Error),
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),
}

// ── ZlibCodec ────────────────────────────────────────────────────────────────

/// Stateless zlib compressor/decompressor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibCodec {
    level: u32,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self { level: DEFAULT_COMPRESSION_LEVEL }
    }
}

impl ZlibCodec {
    /// `level` is clamped to the zlib range 0..=9.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    pub fn level(&self) -> u32 { self.level }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2 + 16),
            Compression::new(self.level),
        );
        encoder.write_all(data).map_err(CodecError::Compression)?;
        encoder.finish().map_err(CodecError::Compression)
    }

    /// Inflate a complete zlib stream.  Input that ends before the stream
    /// trailer is rejected rather than returned as a short buffer.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(64));
        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity());
            }
            let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
            // Finish would put miniz in one-shot mode, which fails as soon as
            // the output buffer is too small; stream with None instead.
            let status = inflater
                .decompress_vec(&data[before_in as usize..], &mut out, FlushDecompress::None)
                .map_err(|e| CodecError::CorruptPayload(e.to_string()))?;
            if status == Status::StreamEnd {
                return Ok(out);
            }
            // Output space is always available here, so no progress means
            // the input ran out before the stream trailer.
            if inflater.total_in() == before_in && inflater.total_out() == before_out {
                return Err(CodecError::CorruptPayload(format!(
                    "zlib stream ends early after {} of {} bytes",
                    inflater.total_in(),
                    data.len(),
                )));
            }
        }
    }
}

/// Compress with the default (fast) level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    ZlibCodec::default().compress(data)
}

/// Inflate a zlib stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    ZlibCodec::default().decompress(data)
}
