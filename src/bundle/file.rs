//! Asset bundle decoder (`UnityFS`, `UnityWeb`, `UnityRaw`).
//!
//! A bundle is a big-endian header, a (possibly compressed) block table that
//! also lists the inner files, and a run of compressed data blocks. The
//! decompressed blocks are concatenated; every inner file is a window into
//! that buffer.

use tracing::{debug, trace};

use crate::core::compression::{decompress_block, decompress_lzma_stream};
use crate::core::{file_name_of, CompressionChoice, CompressionType};
use crate::stream::format::{
    is_bundle_signature, read_signature, SIGNATURE_UNITY_ARCHIVE, SIGNATURE_UNITY_FS, SIGNATURE_UNITY_RAW,
    SIGNATURE_UNITY_WEB,
};
use crate::stream::{ByteView, Endian, EndianReader};
use crate::util::{ver, Error, Result, UnityVersion};

/// Block table and directory stored in one compressed chunk.
pub const FLAG_BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;
/// Block table stored after the data blocks.
pub const FLAG_BLOCKS_INFO_AT_END: u32 = 0x80;
pub const FLAG_OLD_WEB_PLUGIN_COMPATIBILITY: u32 = 0x100;
/// Data blocks start on a 16-byte boundary.
pub const FLAG_BLOCK_INFO_NEED_PADDING_AT_START: u32 = 0x200;

/// Directory node flag marking a serialized file.
pub const NODE_FLAG_SERIALIZED: u32 = 0x4;

/// Layout version from which `UnityWeb`/`UnityRaw` share the `UnityFS` layout.
const FS_LAYOUT_VERSION: u32 = 6;

/// Codec selection for one bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleOptions {
    pub block_compression: CompressionChoice,
    pub block_info_compression: CompressionChoice,
}

#[derive(Debug, Clone, Default)]
pub struct BundleHeader {
    pub signature: String,
    pub version: u32,
    pub unity_version: String,
    pub unity_revision: String,
    /// Total bundle size in bytes (header size for legacy layouts).
    pub size: i64,
    pub compressed_blocks_info_size: u32,
    pub uncompressed_blocks_info_size: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct StorageBlock {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub flags: u16,
}

#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub offset: i64,
    pub size: i64,
    pub flags: u32,
    pub path: String,
}

/// One named inner file.
#[derive(Debug, Clone)]
pub struct StreamFile {
    pub path: String,
    pub file_name: String,
    pub data: ByteView,
}

/// A decoded bundle.
#[derive(Debug)]
pub struct BundleFile {
    pub header: BundleHeader,
    pub blocks: Vec<StorageBlock>,
    pub nodes: Vec<DirectoryNode>,
    pub files: Vec<StreamFile>,
    consumed: u64,
}

impl BundleFile {
    /// Parse the bundle starting at the first byte of `view`.
    pub fn parse(view: &ByteView, options: &BundleOptions) -> Result<Self> {
        let mut r = EndianReader::new(view.as_bytes(), Endian::Big);
        let mut header = BundleHeader {
            signature: r.read_cstring_max(32)?,
            version: r.read_u32()?,
            unity_version: r.read_cstring()?,
            unity_revision: r.read_cstring()?,
            ..Default::default()
        };
        trace!("Bundle {} v{} ({})", header.signature, header.version, header.unity_revision);

        match header.signature.as_str() {
            SIGNATURE_UNITY_FS => Self::parse_fs(view, r, header, options),
            SIGNATURE_UNITY_WEB | SIGNATURE_UNITY_RAW if header.version == FS_LAYOUT_VERSION => {
                Self::parse_fs(view, r, header, options)
            }
            SIGNATURE_UNITY_WEB | SIGNATURE_UNITY_RAW => {
                header.size = 0;
                Self::parse_legacy(view, r, header)
            }
            SIGNATURE_UNITY_ARCHIVE => Err(Error::UnsupportedBundle(SIGNATURE_UNITY_ARCHIVE.to_string())),
            other => Err(Error::UnsupportedBundle(format!("unknown signature \"{other}\""))),
        }
    }

    /// Bytes occupied by this bundle, used to locate a concatenated successor.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Revision string as a version, if it parses.
    pub fn revision(&self) -> Option<UnityVersion> {
        self.header.unity_revision.parse().ok()
    }

    fn parse_fs(view: &ByteView, mut r: EndianReader<'_>, mut header: BundleHeader, options: &BundleOptions) -> Result<Self> {
        header.size = r.read_i64()?;
        header.compressed_blocks_info_size = r.read_u32()?;
        header.uncompressed_blocks_info_size = r.read_u32()?;
        header.flags = r.read_u32()?;
        if header.signature != SIGNATURE_UNITY_FS {
            r.read_u8()?;
        }

        if header.version >= 7 {
            r.align(16)?;
        } else if header.unity_revision.parse::<UnityVersion>().is_ok_and(|v| v.at_least(ver(2019, 4))) {
            // Some 2019.4+ writers pad to 16 bytes without a flag; keep the padding only if it is all zeros
            let before = r.position();
            let pad = (16 - before % 16) % 16;
            let zeros = r.take(pad).map(|p| p.iter().all(|&b| b == 0)).unwrap_or(false);
            if !zeros {
                r.set_position(before)?;
            }
        }

        let info_len = header.compressed_blocks_info_size as usize;
        let info_bytes = if header.flags & FLAG_BLOCKS_INFO_AT_END != 0 {
            let at = (header.size as u64)
                .checked_sub(info_len as u64)
                .ok_or_else(|| Error::invalid("block info larger than bundle"))?;
            view.slice(at, info_len as u64)?.as_bytes().to_vec()
        } else {
            r.take(info_len)?.to_vec()
        };
        let info_codec = options.block_info_compression.resolve(header.flags)?;
        let info = decompress_block(info_codec, &info_bytes, header.uncompressed_blocks_info_size as usize)?;
        let (blocks, nodes) = parse_block_info(&info)?;

        if header.flags & FLAG_BLOCK_INFO_NEED_PADDING_AT_START != 0 {
            r.align(16)?;
        }

        let total: usize = blocks.iter().map(|b| b.uncompressed_size as usize).sum();
        let mut data = Vec::with_capacity(total);
        for (i, block) in blocks.iter().enumerate() {
            let raw = r.take(block.compressed_size as usize)?;
            let codec = options.block_compression.resolve(block.flags as u32)?;
            trace!("Block {i}: {codec} {} -> {}", block.compressed_size, block.uncompressed_size);
            let chunk = decompress_block(codec, raw, block.uncompressed_size as usize)?;
            if codec == CompressionType::None && chunk.len() != block.uncompressed_size as usize {
                return Err(Error::invalid(format!("stored block {i} size mismatch")));
            }
            data.extend_from_slice(&chunk);
        }

        let consumed = if header.size > 0 { header.size as u64 } else { r.position() as u64 };
        let files = slice_nodes(ByteView::from_vec(data), &nodes)?;
        Ok(Self { header, blocks, nodes, files, consumed })
    }

    fn parse_legacy(view: &ByteView, mut r: EndianReader<'_>, mut header: BundleHeader) -> Result<Self> {
        if header.version >= 4 {
            r.skip(16)?; // hash
            r.read_u32()?; // crc
        }
        r.read_u32()?; // minimum streamed bytes
        let header_size = r.read_u32()?;
        r.read_u32()?; // levels before streaming
        let level_count = r.read_count(8)?;
        let mut last = None;
        for _ in 0..level_count {
            last = Some(StorageBlock {
                compressed_size: r.read_u32()?,
                uncompressed_size: r.read_u32()?,
                flags: 0,
            });
        }
        let block = last.ok_or_else(|| Error::invalid("legacy bundle without levels"))?;
        if header.version >= 2 {
            r.read_u32()?; // complete file size
        }
        if header.version >= 3 {
            r.read_u32()?; // file info header size
        }
        header.size = header_size as i64;
        r.set_position(header_size as usize)?;

        let raw = r.take(block.compressed_size as usize)?;
        let data = if header.signature == SIGNATURE_UNITY_WEB {
            decompress_lzma_stream(raw)?
        } else {
            raw.to_vec()
        };

        let mut dir = EndianReader::new(&data, Endian::Big);
        let count = dir.read_count(9)?;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let path = dir.read_cstring()?;
            let offset = dir.read_u32()? as i64;
            let size = dir.read_u32()? as i64;
            nodes.push(DirectoryNode { offset, size, flags: 0, path });
        }

        let consumed = (header_size as u64 + block.compressed_size as u64).min(view.len() as u64);
        let files = slice_nodes(ByteView::from_vec(data), &nodes)?;
        Ok(Self { header, blocks: vec![block], nodes, files, consumed })
    }
}

fn parse_block_info(info: &[u8]) -> Result<(Vec<StorageBlock>, Vec<DirectoryNode>)> {
    let mut r = EndianReader::new(info, Endian::Big);
    r.skip(16)?; // uncompressed data hash
    let blocks = r.read_array(10, |r| {
        Ok(StorageBlock {
            uncompressed_size: r.read_u32()?,
            compressed_size: r.read_u32()?,
            flags: r.read_u16()?,
        })
    })?;
    let nodes = r.read_array(21, |r| {
        Ok(DirectoryNode {
            offset: r.read_i64()?,
            size: r.read_i64()?,
            flags: r.read_u32()?,
            path: r.read_cstring()?,
        })
    })?;
    Ok((blocks, nodes))
}

fn slice_nodes(data: ByteView, nodes: &[DirectoryNode]) -> Result<Vec<StreamFile>> {
    nodes
        .iter()
        .map(|node| {
            if node.offset < 0 || node.size < 0 {
                return Err(Error::invalid(format!("negative extent for \"{}\"", node.path)));
            }
            Ok(StreamFile {
                file_name: file_name_of(&node.path).to_string(),
                path: node.path.clone(),
                data: data.slice(node.offset as u64, node.size as u64)?,
            })
        })
        .collect()
}

/// Iterator over the bundles concatenated in one file.
///
/// Yields `(offset, bundle)` pairs. After each bundle the next candidate
/// starts at `offset + consumed`, past any zero padding; iteration ends when
/// no bundle signature is found there. A parse error is yielded once and
/// ends the iteration.
pub struct BundleSegments<'a> {
    view: &'a ByteView,
    options: BundleOptions,
    offset: u64,
    done: bool,
}

impl<'a> BundleSegments<'a> {
    pub fn new(view: &'a ByteView, options: BundleOptions) -> Self {
        Self { view, options, offset: 0, done: false }
    }
}

impl Iterator for BundleSegments<'_> {
    type Item = Result<(u64, BundleFile)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let len = self.view.len() as u64;
        if self.offset > 0 {
            let bytes = self.view.as_bytes();
            while self.offset < len && bytes[self.offset as usize] == 0 {
                self.offset += 1;
            }
            if self.offset >= len || !is_bundle_signature(read_signature(&bytes[self.offset as usize..])) {
                self.done = true;
                return None;
            }
            debug!("Next bundle at offset 0x{:X}", self.offset);
        }

        let offset = self.offset;
        let result = self
            .view
            .slice_from(offset)
            .and_then(|segment| BundleFile::parse(&segment, &self.options));
        match result {
            Ok(bundle) => {
                if bundle.consumed() == 0 {
                    self.done = true;
                }
                self.offset = offset + bundle.consumed();
                Some(Ok((offset, bundle)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
