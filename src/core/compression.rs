//! Block and wrapper codecs.
//!
//! Bundle blocks name their codec in the low six bits of the block flags.
//! Whole-file wrappers (gzip, brotli) are detected by signature instead.

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

use flate2::read::GzDecoder;
use lzma_rs::decompress::{Options, UnpackedSize};

use crate::util::{Error, Result};

/// Mask selecting the codec from bundle and block flags.
pub const COMPRESSION_TYPE_MASK: u32 = 0x3F;

/// Size of the LZMA properties header in front of raw block streams.
pub const LZMA_PROPS_SIZE: usize = 5;

/// Block codecs found in bundle headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    Lzma,
    Lz4,
    Lz4HC,
    Lzham,
}

impl CompressionType {
    /// Decode from a flags word.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags & COMPRESSION_TYPE_MASK {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzma),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::Lz4HC),
            4 => Ok(Self::Lzham),
            other => Err(Error::UnsupportedCompression(format!("codec tag {other}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Lzma => "LZMA",
            Self::Lz4 => "LZ4",
            Self::Lz4HC => "LZ4HC",
            Self::Lzham => "LZHAM",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec selection: trust the header, or force one codec for every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionChoice {
    #[default]
    Auto,
    Forced(CompressionType),
}

impl CompressionChoice {
    /// Codec to use for a block whose header says `flags`.
    pub fn resolve(self, flags: u32) -> Result<CompressionType> {
        match self {
            Self::Auto => CompressionType::from_flags(flags),
            Self::Forced(c) => Ok(c),
        }
    }
}

impl FromStr for CompressionChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let c = match s.to_ascii_lowercase().as_str() {
            "auto" => return Ok(Self::Auto),
            "none" => CompressionType::None,
            "lzma" => CompressionType::Lzma,
            "lz4" => CompressionType::Lz4,
            "lz4hc" => CompressionType::Lz4HC,
            "lzham" => CompressionType::Lzham,
            _ => return Err(Error::other(format!("unknown compression \"{s}\""))),
        };
        Ok(Self::Forced(c))
    }
}

/// Decompress one bundle block into exactly `uncompressed_size` bytes.
pub fn decompress_block(codec: CompressionType, data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lzma => decompress_lzma_raw(data, uncompressed_size),
        CompressionType::Lz4 | CompressionType::Lz4HC => decompress_lz4(data, uncompressed_size),
        CompressionType::Lzham => Err(Error::UnsupportedCompression(codec.name().to_string())),
    }
}

/// LZ4 block format with a known output size.
pub fn decompress_lz4(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; uncompressed_size];
    let written = lz4_flex::block::decompress_into(data, &mut out).map_err(|e| Error::decompression("LZ4", e))?;
    if written != uncompressed_size {
        return Err(Error::decompression(
            "LZ4",
            format!("expected {uncompressed_size} bytes, got {written}"),
        ));
    }
    Ok(out)
}

/// Properties header followed by the raw stream; the size is not stored.
pub fn decompress_lzma_raw(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    if data.len() < LZMA_PROPS_SIZE {
        return Err(Error::decompression("LZMA", "block shorter than its properties header"));
    }
    let options = Options {
        unpacked_size: UnpackedSize::UseProvided(Some(uncompressed_size as u64)),
        ..Default::default()
    };
    lzma_with(data, options, uncompressed_size)
}

/// Standard `.lzma` stream with a 13-byte header carrying the size.
pub fn decompress_lzma_stream(data: &[u8]) -> Result<Vec<u8>> {
    lzma_with(data, Options::default(), data.len() * 2)
}

fn lzma_with(data: &[u8], options: Options, capacity: usize) -> Result<Vec<u8>> {
    let mut input = Cursor::new(data);
    let mut out = Vec::with_capacity(capacity);
    lzma_rs::lzma_decompress_with_options(&mut input, &mut out, &options)
        .map_err(|e| Error::decompression("LZMA", e))?;
    Ok(out)
}

/// Whole-file gzip wrapper.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data).read_to_end(&mut out).map_err(|e| Error::decompression("GZip", e))?;
    Ok(out)
}

/// Whole-file brotli wrapper.
pub fn unbrotli(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    brotli_decompressor::Decompressor::new(data, 4096)
        .read_to_end(&mut out)
        .map_err(|e| Error::decompression("Brotli", e))?;
    Ok(out)
}
