//! Serialized-object file parser.
//!
//! Layout: a big-endian header, then (in the header's declared byte order)
//! the engine version, the type table, the object directory, script types,
//! external references, ref types and user information. Object payloads
//! live at `data_offset + byte_start`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use super::object::ObjectReader;
use super::schema::TypeTree;
use crate::core::file_name_of;
use crate::stream::format::LARGE_HEADER_VERSION;
use crate::stream::{ByteView, Endian, EndianReader};
use crate::util::{Error, Result, UnityVersion};

/// Version string assumed when a file predates embedded versions.
pub const DEFAULT_LEGACY_VERSION: &str = "2.5.0f5";

/// Class id of `MonoBehaviour`, whose types carry a script hash.
const MONO_BEHAVIOUR_CLASS: i32 = 114;

/// Editor-only build target.
pub const BUILD_TARGET_NO_TARGET: i32 = -2;

#[derive(Debug, Clone, Default)]
pub struct SerializedFileHeader {
    pub metadata_size: u32,
    pub file_size: i64,
    /// Format version (not the engine version).
    pub version: u32,
    pub data_offset: i64,
    pub endianness: u8,
}

/// One entry of the type table.
#[derive(Debug, Clone, Default)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped_type: bool,
    pub script_type_index: i16,
    pub type_tree: Option<Arc<TypeTree>>,
    pub script_id: Option<[u8; 16]>,
    pub old_type_hash: [u8; 16],
    pub type_dependencies: Vec<i32>,
    pub class_name: String,
    pub name_space: String,
    pub asm_name: String,
}

/// Object directory entry.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub path_id: i64,
    /// Absolute offset of the payload inside the member.
    pub byte_start: u64,
    pub byte_size: u32,
    pub type_id: i32,
    pub class_id: i32,
    /// Index into [`SerializedFile::types`].
    pub type_index: Option<usize>,
    pub is_destroyed: u16,
    pub stripped: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptIdentifier {
    pub file_index: i32,
    pub path_id: i64,
}

/// External file this member references.
#[derive(Debug, Clone)]
pub struct FileIdentifier {
    pub guid: [u8; 16],
    pub kind: i32,
    pub path_name: String,
    /// Last component of `path_name`; the lookup key across members.
    pub file_name: String,
}

/// One parsed serialized-object file.
#[derive(Debug)]
pub struct SerializedFile {
    pub file_name: String,
    /// File on disk this member came from (the bundle for bundle members).
    pub original_path: Option<PathBuf>,
    pub header: SerializedFileHeader,
    pub endian: Endian,
    pub unity_version: String,
    pub version: UnityVersion,
    pub target_platform: i32,
    pub enable_type_tree: bool,
    pub types: Vec<SerializedType>,
    pub big_id_enabled: i32,
    pub objects: Vec<ObjectInfo>,
    pub scripts: Vec<ScriptIdentifier>,
    pub externals: Vec<FileIdentifier>,
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
    data: ByteView,
}

impl SerializedFile {
    /// Parse a member from its complete bytes.
    pub fn parse(data: ByteView, file_name: impl Into<String>, original_path: Option<PathBuf>) -> Result<Self> {
        let file_name = file_name.into();
        let bytes = data.as_bytes();
        let mut r = EndianReader::new(bytes, Endian::Big);

        let mut header = SerializedFileHeader {
            metadata_size: r.read_u32()?,
            file_size: r.read_u32()? as i64,
            version: r.read_u32()?,
            data_offset: r.read_u32()? as i64,
            endianness: 0,
        };
        let format = header.version;
        if format >= 9 {
            header.endianness = r.read_u8()?;
            r.skip(3)?;
        } else {
            let at = (header.file_size - header.metadata_size as i64).max(0) as usize;
            r.set_position(at)?;
            header.endianness = r.read_u8()?;
        }
        if format >= LARGE_HEADER_VERSION {
            header.metadata_size = r.read_u32()?;
            header.file_size = r.read_i64()?;
            header.data_offset = r.read_i64()?;
            r.skip(8)?;
        }
        if header.data_offset < 0 || header.data_offset as u64 > bytes.len() as u64 {
            return Err(Error::invalid(format!("data offset {} outside file", header.data_offset)));
        }
        let endian = if header.endianness == 0 { Endian::Little } else { Endian::Big };
        r.set_endian(endian);

        let unity_version = if format >= 7 { r.read_cstring()? } else { DEFAULT_LEGACY_VERSION.to_string() };
        let version = unity_version.parse().unwrap_or_default();
        let target_platform = if format >= 8 { r.read_i32()? } else { 0 };
        let enable_type_tree = if format >= 13 { r.read_bool()? } else { true };
        trace!("{file_name}: format {format}, version {unity_version}, platform {target_platform}");

        let mut meta = MetadataReader { r, format, enable_type_tree };
        let type_count = meta.r.read_count(4)?;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(meta.read_serialized_type(false)?);
        }

        let big_id_enabled = if (7..14).contains(&format) { meta.r.read_i32()? } else { 0 };

        let object_count = meta.r.read_count(12)?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let info = meta.read_object_info(big_id_enabled, header.data_offset as u64, &mut types)?;
            objects.push(info);
        }

        let scripts = if format >= 11 {
            let r = &mut meta.r;
            r.read_array(8, |r| {
                let file_index = r.read_i32()?;
                let path_id = if format < 14 {
                    r.read_i32()? as i64
                } else {
                    r.align(4)?;
                    r.read_i64()?
                };
                Ok(ScriptIdentifier { file_index, path_id })
            })?
        } else {
            Vec::new()
        };

        let externals = meta.r.read_array(1, |r| {
            if format >= 6 {
                r.read_cstring()?;
            }
            let (guid, kind) = if format >= 5 {
                let mut guid = [0u8; 16];
                guid.copy_from_slice(r.take(16)?);
                (guid, r.read_i32()?)
            } else {
                ([0u8; 16], 0)
            };
            let path_name = r.read_cstring()?;
            Ok(FileIdentifier { guid, kind, file_name: file_name_of(&path_name).to_string(), path_name })
        })?;

        let mut ref_types = Vec::new();
        if format >= 20 {
            let count = meta.r.read_count(4)?;
            for _ in 0..count {
                ref_types.push(meta.read_serialized_type(true)?);
            }
        }

        let user_information = if format >= 5 { meta.r.read_cstring()? } else { String::new() };

        Ok(Self {
            file_name,
            original_path,
            header,
            endian,
            unity_version,
            version,
            target_platform,
            enable_type_tree,
            types,
            big_id_enabled,
            objects,
            scripts,
            externals,
            ref_types,
            user_information,
            data,
        })
    }

    /// Replace the engine version (override or bundle revision).
    pub fn set_version(&mut self, version: UnityVersion) {
        self.unity_version = version.to_string();
        self.version = version;
    }

    /// Format version of the file layout.
    #[inline]
    pub fn format_version(&self) -> u32 {
        self.header.version
    }

    /// Directory containing the file on disk, used for sibling lookups.
    pub fn directory(&self) -> Option<&Path> {
        self.original_path.as_deref().and_then(Path::parent)
    }

    /// Whole member bytes.
    #[inline]
    pub fn data(&self) -> &ByteView {
        &self.data
    }

    /// Schema declared for an object, if the member carries one.
    pub fn type_tree(&self, info: &ObjectInfo) -> Option<&Arc<TypeTree>> {
        info.type_index
            .and_then(|i| self.types.get(i))
            .and_then(|t| t.type_tree.as_ref())
            .filter(|t| !t.is_empty())
    }

    /// Positioned reader over one object's payload.
    pub fn object_reader<'a>(&'a self, info: &'a ObjectInfo) -> Result<ObjectReader<'a>> {
        let end = info.byte_start.checked_add(info.byte_size as u64).ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.data.len() as u64 {
            return Err(Error::UnexpectedEof(end));
        }
        let bytes = &self.data.as_bytes()[info.byte_start as usize..end as usize];
        Ok(ObjectReader::new(EndianReader::new(bytes, self.endian), info, self))
    }
}

struct MetadataReader<'a> {
    r: EndianReader<'a>,
    format: u32,
    enable_type_tree: bool,
}

impl MetadataReader<'_> {
    fn read_serialized_type(&mut self, is_ref_type: bool) -> Result<SerializedType> {
        let format = self.format;
        let r = &mut self.r;
        let mut ty = SerializedType { class_id: r.read_i32()?, script_type_index: -1, ..Default::default() };
        if format >= 16 {
            ty.is_stripped_type = r.read_bool()?;
        }
        if format >= 17 {
            ty.script_type_index = r.read_i16()?;
        }
        if format >= 13 {
            let has_script_id = (is_ref_type && ty.script_type_index >= 0)
                || (format < 16 && ty.class_id < 0)
                || (format >= 16 && ty.class_id == MONO_BEHAVIOUR_CLASS);
            if has_script_id {
                let mut id = [0u8; 16];
                id.copy_from_slice(r.take(16)?);
                ty.script_id = Some(id);
            }
            ty.old_type_hash.copy_from_slice(r.take(16)?);
        }

        if self.enable_type_tree {
            let tree = if format >= 12 || format == 10 {
                TypeTree::read_blob(r, format)?
            } else {
                TypeTree::read_legacy(r, format)?
            };
            ty.type_tree = Some(Arc::new(tree));
            if format >= 21 {
                if is_ref_type {
                    ty.class_name = r.read_cstring()?;
                    ty.name_space = r.read_cstring()?;
                    ty.asm_name = r.read_cstring()?;
                } else {
                    ty.type_dependencies = r.read_i32_array()?;
                }
            }
        }
        Ok(ty)
    }

    fn read_object_info(&mut self, big_id_enabled: i32, data_offset: u64, types: &mut [SerializedType]) -> Result<ObjectInfo> {
        let format = self.format;
        let r = &mut self.r;
        let path_id = if big_id_enabled != 0 {
            r.read_i64()?
        } else if format < 14 {
            r.read_i32()? as i64
        } else {
            r.align(4)?;
            r.read_i64()?
        };
        let byte_start = if format >= LARGE_HEADER_VERSION {
            let start = r.read_i64()?;
            u64::try_from(start).map_err(|_| Error::invalid(format!("object {path_id} has negative offset {start}")))?
        } else {
            r.read_u32()? as u64
        };
        let byte_start = byte_start
            .checked_add(data_offset)
            .ok_or_else(|| Error::invalid(format!("object {path_id} offset {byte_start} overflows")))?;
        let byte_size = r.read_u32()?;
        let type_id = r.read_i32()?;

        let (class_id, type_index) = if format < 16 {
            let class_id = r.read_u16()? as i32;
            (class_id, types.iter().position(|t| t.class_id == type_id))
        } else {
            let index = usize::try_from(type_id)
                .ok()
                .filter(|&i| i < types.len())
                .ok_or_else(|| Error::invalid(format!("object {path_id} has type index {type_id} out of range")))?;
            (types[index].class_id, Some(index))
        };

        let is_destroyed = if format < 11 { r.read_u16()? } else { 0 };
        if (11..17).contains(&format) {
            let script_type_index = r.read_i16()?;
            if let Some(ty) = type_index.and_then(|i| types.get_mut(i)) {
                ty.script_type_index = script_type_index;
            }
        }
        let stripped = if format == 15 || format == 16 { r.read_u8()? } else { 0 };

        Ok(ObjectInfo {
            path_id,
            byte_start,
            byte_size,
            type_id,
            class_id,
            type_index,
            is_destroyed,
            stripped,
        })
    }
}
