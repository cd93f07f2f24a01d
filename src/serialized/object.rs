//! Reader positioned on one object's payload.

use std::ops::{Deref, DerefMut};

use super::file::{ObjectInfo, SerializedFile, BUILD_TARGET_NO_TARGET};
use super::pptr::PPtr;
use crate::stream::EndianReader;
use crate::util::{ver, Result, UnityVersion, Vec3};

/// Byte reader over an object plus the context its decoder branches on.
pub struct ObjectReader<'a> {
    reader: EndianReader<'a>,
    pub info: &'a ObjectInfo,
    pub file: &'a SerializedFile,
}

impl<'a> ObjectReader<'a> {
    pub fn new(reader: EndianReader<'a>, info: &'a ObjectInfo, file: &'a SerializedFile) -> Self {
        Self { reader, info, file }
    }

    #[inline]
    pub fn version(&self) -> &'a UnityVersion {
        &self.file.version
    }

    /// Serialized-file format version.
    #[inline]
    pub fn format(&self) -> u32 {
        self.file.format_version()
    }

    #[inline]
    pub fn platform(&self) -> i32 {
        self.file.target_platform
    }

    /// Editor builds prefix several base classes with extra fields.
    #[inline]
    pub fn is_editor(&self) -> bool {
        self.file.target_platform == BUILD_TARGET_NO_TARGET
    }

    #[inline]
    pub fn byte_size(&self) -> u32 {
        self.info.byte_size
    }

    /// Rewind to the start of the payload.
    pub fn reset(&mut self) {
        // position 0 is always in bounds
        let _ = self.reader.set_position(0);
    }

    /// `(file id, path id)`; the path id is 32-bit before format 14.
    pub fn read_pptr<T>(&mut self) -> Result<PPtr<T>> {
        let file_id = self.reader.read_i32()?;
        let path_id = if self.format() < 14 { self.reader.read_i32()? as i64 } else { self.reader.read_i64()? };
        Ok(PPtr::new(file_id, path_id))
    }

    pub fn read_pptr_array<T>(&mut self) -> Result<Vec<PPtr<T>>> {
        self.read_objects(8, Self::read_pptr)
    }

    /// Count-prefixed array whose elements need the object context.
    pub fn read_objects<T>(&mut self, min_elem_size: usize, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.reader.read_count(min_elem_size)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    /// `Vector3f` from 5.4; earlier layouts store a padded `Vector4f`.
    pub fn read_vec3_or_4(&mut self) -> Result<Vec3> {
        if self.version().at_least(ver(5, 4)) {
            self.reader.read_vec3()
        } else {
            Ok(self.reader.read_vec4()?.truncate())
        }
    }
}

impl<'a> Deref for ObjectReader<'a> {
    type Target = EndianReader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl DerefMut for ObjectReader<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}
