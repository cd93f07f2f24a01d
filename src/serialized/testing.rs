//! In-memory members and payload writers for decoder tests.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use super::SerializedFile;
use crate::stream::ByteView;

const HEADER_SIZE: usize = 20;

/// Format-17 player member without type trees, holding `payload` as
/// object 1 of `class_id`.
pub(crate) fn member(version: &str, class_id: i32, payload: &[u8]) -> SerializedFile {
    let mut meta = Vec::new();
    cstr(&mut meta, version);
    meta.write_i32::<LittleEndian>(5).unwrap();
    meta.push(0);
    meta.write_i32::<LittleEndian>(1).unwrap();
    meta.write_i32::<LittleEndian>(class_id).unwrap();
    meta.push(0);
    meta.write_i16::<LittleEndian>(-1).unwrap();
    meta.extend_from_slice(&[0x5A; 16]);

    meta.write_i32::<LittleEndian>(1).unwrap();
    while (HEADER_SIZE + meta.len()) % 4 != 0 {
        meta.push(0);
    }
    meta.write_i64::<LittleEndian>(1).unwrap();
    meta.write_u32::<LittleEndian>(0).unwrap();
    meta.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
    meta.write_i32::<LittleEndian>(0).unwrap();
    // scripts, externals
    meta.write_i32::<LittleEndian>(0).unwrap();
    meta.write_i32::<LittleEndian>(0).unwrap();
    cstr(&mut meta, "");

    let data_offset = (HEADER_SIZE + meta.len() + 15) / 16 * 16;
    let mut out = Vec::with_capacity(data_offset + payload.len());
    out.write_u32::<BigEndian>(meta.len() as u32).unwrap();
    out.write_u32::<BigEndian>((data_offset + payload.len()) as u32).unwrap();
    out.write_u32::<BigEndian>(17).unwrap();
    out.write_u32::<BigEndian>(data_offset as u32).unwrap();
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&meta);
    out.resize(data_offset, 0);
    out.extend_from_slice(payload);
    SerializedFile::parse(ByteView::from_vec(out), "test.assets", None).unwrap()
}

fn cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Little-endian object payload, aligned relative to its own start.
#[derive(Default)]
pub(crate) struct Payload {
    buf: Vec<u8>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.write_i32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.write_u32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.write_u16::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.write_f32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(v as u8);
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn pptr(&mut self, file_id: i32, path_id: i64) -> &mut Self {
        self.i32(file_id);
        self.buf.write_i64::<LittleEndian>(path_id).unwrap();
        self
    }

    pub fn align(&mut self) -> &mut Self {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.i32(s.len() as i32).bytes(s.as_bytes()).align()
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
