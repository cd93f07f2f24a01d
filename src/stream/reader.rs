//! Positioned, endianness-aware reader over a byte slice.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::util::{Aabb, Error, Mat4, Quat, Result, Vec2, Vec3, Vec4};

/// Byte order of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Cursor over a borrowed buffer.
///
/// All reads are bounds-checked and fail with [`Error::UnexpectedEof`]
/// carrying the offending position.
#[derive(Debug, Clone)]
pub struct EndianReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! read_num {
    ($name:ident, $ty:ty, $size:expr, $fn:ident) => {
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            let b = self.take($size)?;
            Ok(match self.endian {
                Endian::Little => LittleEndian::$fn(b),
                Endian::Big => BigEndian::$fn(b),
            })
        }
    };
}

impl<'a> EndianReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, pos: 0, endian }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::UnexpectedEof(pos as u64));
        }
        self.pos = pos;
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whole underlying buffer.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow the next `n` bytes and advance.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.data.len() {
            return Err(Error::UnexpectedEof(end as u64));
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Advance to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.skip(alignment - rem)?;
        }
        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_num!(read_u16, u16, 2, read_u16);
    read_num!(read_i16, i16, 2, read_i16);
    read_num!(read_u32, u32, 4, read_u32);
    read_num!(read_i32, i32, 4, read_i32);
    read_num!(read_u64, u64, 8, read_u64);
    read_num!(read_i64, i64, 8, read_i64);
    read_num!(read_f32, f32, 4, read_f32);
    read_num!(read_f64, f64, 8, read_f64);

    /// Null-terminated string, up to `max_len` bytes.
    pub fn read_cstring(&mut self) -> Result<String> {
        self.read_cstring_max(usize::MAX)
    }

    pub fn read_cstring_max(&mut self, max_len: usize) -> Result<String> {
        let rest = &self.data[self.pos..];
        let limit = rest.len().min(max_len);
        match rest[..limit].iter().position(|&b| b == 0) {
            Some(n) => {
                let s = String::from_utf8_lossy(&rest[..n]).into_owned();
                self.pos += n + 1;
                Ok(s)
            }
            None if limit == max_len => {
                let s = String::from_utf8_lossy(&rest[..limit]).into_owned();
                self.pos += limit;
                Ok(s)
            }
            None => Err(Error::UnexpectedEof(self.data.len() as u64)),
        }
    }

    /// Element count prefix, validated against the bytes left.
    pub fn read_count(&mut self, min_elem_size: usize) -> Result<usize> {
        let at = self.pos;
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::invalid(format!("negative element count {count} at {at}")));
        }
        let count = count as usize;
        if count.saturating_mul(min_elem_size) > self.remaining() {
            return Err(Error::UnexpectedEof((self.pos + count * min_elem_size) as u64));
        }
        Ok(count)
    }

    /// Length-prefixed string without trailing alignment.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_count(1)?;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    /// Length-prefixed string followed by 4-byte alignment.
    pub fn read_aligned_string(&mut self) -> Result<String> {
        let s = self.read_string()?;
        self.align(4)?;
        Ok(s)
    }

    /// Count-prefixed raw bytes.
    pub fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let len = self.read_count(1)?;
        self.take(len)
    }

    /// Count-prefixed array decoded element by element.
    pub fn read_array<T>(&mut self, min_elem_size: usize, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.read_count(min_elem_size)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    /// Exactly `count` elements, no prefix.
    pub fn read_n<T>(&mut self, count: usize, mut f: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    pub fn read_u16_array(&mut self) -> Result<Vec<u16>> {
        self.read_array(2, Self::read_u16)
    }

    pub fn read_i32_array(&mut self) -> Result<Vec<i32>> {
        self.read_array(4, Self::read_i32)
    }

    pub fn read_u32_array(&mut self) -> Result<Vec<u32>> {
        self.read_array(4, Self::read_u32)
    }

    pub fn read_f32_array(&mut self) -> Result<Vec<f32>> {
        self.read_array(4, Self::read_f32)
    }

    pub fn read_string_array(&mut self) -> Result<Vec<String>> {
        self.read_array(4, Self::read_aligned_string)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(self.read_f32()?, self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_quat(&mut self) -> Result<Quat> {
        let v = self.read_vec4()?;
        Ok(Quat::from_xyzw(v.x, v.y, v.z, v.w))
    }

    /// 4x4 matrix stored column-major.
    pub fn read_mat4(&mut self) -> Result<Mat4> {
        let mut cols = [0f32; 16];
        for c in &mut cols {
            *c = self.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    pub fn read_mat4_array(&mut self) -> Result<Vec<Mat4>> {
        self.read_array(64, Self::read_mat4)
    }

    pub fn read_aabb(&mut self) -> Result<Aabb> {
        Ok(Aabb::new(self.read_vec3()?, self.read_vec3()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endianness() {
        let data = [0x00, 0x00, 0x01, 0x02];
        let mut be = EndianReader::new(&data, Endian::Big);
        assert_eq!(be.read_u32().unwrap(), 0x0102);
        let mut le = EndianReader::new(&data, Endian::Little);
        assert_eq!(le.read_u32().unwrap(), 0x0201_0000);
    }

    #[test]
    fn test_aligned_string() {
        let mut data = 3i32.to_le_bytes().to_vec();
        data.extend_from_slice(b"abc\0");
        data.extend_from_slice(&7u32.to_le_bytes());
        let mut r = EndianReader::new(&data, Endian::Little);
        assert_eq!(r.read_aligned_string().unwrap(), "abc");
        assert_eq!(r.position(), 8);
        assert_eq!(r.read_u32().unwrap(), 7);
    }

    #[test]
    fn test_cstring() {
        let data = b"UnityFS\0rest";
        let mut r = EndianReader::new(data, Endian::Big);
        assert_eq!(r.read_cstring().unwrap(), "UnityFS");
        assert_eq!(r.position(), 8);
        let mut r = EndianReader::new(b"abcdef", Endian::Big);
        assert_eq!(r.read_cstring_max(4).unwrap(), "abcd");
        assert!(EndianReader::new(b"abc", Endian::Big).read_cstring().is_err());
    }

    #[test]
    fn test_count_guard() {
        let data = 1000i32.to_le_bytes();
        let mut r = EndianReader::new(&data, Endian::Little);
        assert!(matches!(r.read_f32_array(), Err(Error::UnexpectedEof(_))));
        let data = (-1i32).to_le_bytes();
        let mut r = EndianReader::new(&data, Endian::Little);
        assert!(matches!(r.read_f32_array(), Err(Error::InvalidStructure(_))));
    }

    #[test]
    fn test_eof_position() {
        let mut r = EndianReader::new(&[1, 2], Endian::Little);
        assert!(matches!(r.read_u32(), Err(Error::UnexpectedEof(4))));
        assert_eq!(r.position(), 0);
    }
}
