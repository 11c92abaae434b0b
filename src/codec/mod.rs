//! Compression registry: the three algorithms an index payload may use.
//!
//! # Identity rules
//! Each algorithm is identified on disk by a single nibble in the low half
//! of the header flag byte.  These values are fixed by the format and are
//! shared with every existing TINFOIL index reader:
//!
//! | id     | nibble |
//! |--------|--------|
//! | none   | `0x0`  |
//! | zstd   | `0xD`  |
//! | zlib   | `0xE`  |
//!
//! A reader that sees any other nibble MUST fail with
//! [`CodecError::UnsupportedCompression`].  There is no pass-through
//! fallback.
//!
//! # Effort
//! Writers always use the maximum level of each algorithm: an index is
//! generated rarely and downloaded often, so output size wins over CPU time.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Highest standard zstd level ("ultra" range).
pub const ZSTD_MAX_LEVEL: i32 = 22;
/// Highest zlib level.
pub const ZLIB_MAX_LEVEL: u32 = 9;

// ── CompressionId ────────────────────────────────────────────────────────────

/// Compression algorithm carried in the low nibble of the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionId {
    None = 0x00,
    Zstd = 0x0D,
    Zlib = 0x0E,
}

impl CompressionId {
    pub const ALL: [CompressionId; 3] = [CompressionId::None, CompressionId::Zstd, CompressionId::Zlib];

    /// The on-disk nibble for this algorithm.
    #[inline]
    pub fn nibble(self) -> u8 {
        self as u8
    }

    /// Resolve an on-disk nibble.  Only the low four bits are considered.
    pub fn from_nibble(nibble: u8) -> Result<Self, CodecError> {
        match nibble & 0x0F {
            0x00 => Ok(CompressionId::None),
            0x0D => Ok(CompressionId::Zstd),
            0x0E => Ok(CompressionId::Zlib),
            other => Err(CodecError::UnsupportedCompression(other)),
        }
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            CompressionId::None => "none",
            CompressionId::Zstd => "zstd",
            CompressionId::Zlib => "zlib",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CompressionId::None),
            "zstd" => Some(CompressionId::Zstd),
            "zlib" => Some(CompressionId::Zlib),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported compression id 0x{0:02X}")]
    UnsupportedCompression(u8),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compression_id(&self) -> CompressionId;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn compression_id(&self) -> CompressionId { CompressionId::None }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

/// Zstandard at level 22 with the frame content checksum enabled, so a
/// damaged frame is rejected instead of decoding to different bytes.
pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn compression_id(&self) -> CompressionId { CompressionId::Zstd }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        // One-shot API: the source size is known, so level 22 parameters are
        // scaled down to the input instead of reserving a 128 MiB window.
        let mut enc = zstd::bulk::Compressor::new(ZSTD_MAX_LEVEL)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.include_checksum(true)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.compress(data).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

/// zlib stream (RFC 1950, Adler-32 trailer) at level 9.
pub struct ZlibCodec;
impl Codec for ZlibCodec {
    fn compression_id(&self) -> CompressionId { CompressionId::Zlib }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(ZLIB_MAX_LEVEL));
        enc.write_all(data)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a CompressionId to a built-in codec.
pub fn get_codec(id: CompressionId) -> Box<dyn Codec> {
    match id {
        CompressionId::None => Box::new(NoneCodec),
        CompressionId::Zstd => Box::new(ZstdCodec),
        CompressionId::Zlib => Box::new(ZlibCodec),
    }
}

/// Resolve a raw flag nibble to a built-in codec.
///
/// Returns `Err(CodecError::UnsupportedCompression)` for unknown nibbles.
/// The caller MUST NOT fall back to any other codec.
pub fn get_codec_by_nibble(nibble: u8) -> Result<Box<dyn Codec>, CodecError> {
    CompressionId::from_nibble(nibble).map(get_codec)
}

pub fn compress(raw: &[u8], id: CompressionId) -> Result<Vec<u8>, CodecError> {
    get_codec(id).compress(raw)
}

pub fn decompress(data: &[u8], id: CompressionId) -> Result<Vec<u8>, CodecError> {
    get_codec(id).decompress(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut v = b"{\"files\":[\"game.nsp\"],\"success\":\"ok\"}".repeat(64);
        v.extend((0u8..=255).cycle().take(4096));
        v
    }

    #[test]
    fn every_codec_round_trips() {
        let raw = sample();
        for id in CompressionId::ALL {
            let packed = compress(&raw, id).unwrap();
            assert_eq!(decompress(&packed, id).unwrap(), raw, "codec {id}");
        }
    }

    #[test]
    fn none_is_identity() {
        let raw = sample();
        assert_eq!(compress(&raw, CompressionId::None).unwrap(), raw);
    }

    #[test]
    fn real_codecs_shrink_repetitive_input() {
        let raw = b"aaaaaaaaaaaaaaaa".repeat(512);
        for id in [CompressionId::Zstd, CompressionId::Zlib] {
            assert!(compress(&raw, id).unwrap().len() < raw.len() / 10);
        }
    }

    #[test]
    fn empty_input_round_trips() {
        for id in CompressionId::ALL {
            let packed = compress(b"", id).unwrap();
            assert!(decompress(&packed, id).unwrap().is_empty());
        }
    }

    #[test]
    fn unknown_nibble_is_rejected() {
        for nibble in [0x01u8, 0x05, 0x0C, 0x0F] {
            assert!(matches!(
                get_codec_by_nibble(nibble),
                Err(CodecError::UnsupportedCompression(n)) if n == nibble
            ));
        }
    }

    #[test]
    fn nibbles_match_the_format() {
        assert_eq!(CompressionId::None.nibble(), 0x00);
        assert_eq!(CompressionId::Zstd.nibble(), 0x0D);
        assert_eq!(CompressionId::Zlib.nibble(), 0x0E);
        for id in CompressionId::ALL {
            assert_eq!(CompressionId::from_nibble(id.nibble()).unwrap(), id);
            assert_eq!(CompressionId::from_name(id.name()), Some(id));
        }
        assert_eq!(CompressionId::from_name("ZSTD"), Some(CompressionId::Zstd));
        assert_eq!(CompressionId::from_name("lz4"), None);
    }

    #[test]
    fn damaged_zstd_frame_is_rejected() {
        let mut packed = compress(&sample(), CompressionId::Zstd).unwrap();
        let mid = packed.len() / 2;
        packed[mid] ^= 0x55;
        assert!(decompress(&packed, CompressionId::Zstd).is_err());
    }

    #[test]
    fn damaged_zlib_stream_is_rejected() {
        let mut packed = compress(&sample(), CompressionId::Zlib).unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0x01;
        assert!(decompress(&packed, CompressionId::Zlib).is_err());
    }
}
