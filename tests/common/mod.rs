//! Builders for small serialized files and bundles used by the integration tests.

#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

/// Player build target; objects carry no editor-only prefix.
pub const PLATFORM_STANDALONE: i32 = 5;

const HEADER_SIZE: usize = 20;
const FLAG_ALIGN: i32 = 0x4000;

/// Little-endian payload writer for object data.
#[derive(Default)]
pub struct ByteWriter {
    pub buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.write_i32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.buf.write_i64::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.write_f32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32s(&mut self, vs: &[f32]) -> &mut Self {
        for &v in vs {
            self.f32(v);
        }
        self
    }

    pub fn pptr(&mut self, file_id: i32, path_id: i64) -> &mut Self {
        self.i32(file_id).i64(path_id)
    }

    pub fn align(&mut self) -> &mut Self {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
        self
    }

    /// Length-prefixed string, aligned to 4.
    pub fn string(&mut self, s: &str) -> &mut Self {
        self.i32(s.len() as i32);
        self.buf.extend_from_slice(s.as_bytes());
        self.align()
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// One type-tree node: `(level, type, name, byte_size, is_array, meta_flag)`.
pub type Node = (u8, &'static str, &'static str, i32, bool, i32);

/// Schema nodes for an aligned `string` field at `level`.
pub fn string_nodes(level: u8, name: &'static str) -> Vec<Node> {
    vec![
        (level, "string", name, -1, false, 0),
        (level + 1, "Array", "Array", -1, true, FLAG_ALIGN),
        (level + 2, "int", "size", 4, false, 0),
        (level + 2, "char", "data", 1, false, 0),
    ]
}

struct TypeDef {
    class_id: i32,
    nodes: Vec<Node>,
}

struct ObjectDef {
    path_id: i64,
    type_index: i32,
    data: Vec<u8>,
}

/// Format-17 little-endian serialized file.
pub struct SerializedBuilder {
    version: String,
    platform: i32,
    type_trees: bool,
    types: Vec<TypeDef>,
    objects: Vec<ObjectDef>,
    externals: Vec<String>,
}

impl SerializedBuilder {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            platform: PLATFORM_STANDALONE,
            type_trees: false,
            types: Vec::new(),
            objects: Vec::new(),
            externals: Vec::new(),
        }
    }

    /// Store the schema of every type.
    pub fn with_type_trees(mut self) -> Self {
        self.type_trees = true;
        self
    }

    pub fn external(mut self, path: &str) -> Self {
        self.externals.push(path.to_string());
        self
    }

    /// Register a class without schema nodes.
    pub fn class(self, class_id: i32) -> Self {
        self.typed(class_id, Vec::new())
    }

    pub fn typed(mut self, class_id: i32, nodes: Vec<Node>) -> Self {
        self.types.push(TypeDef { class_id, nodes });
        self
    }

    /// Add an object of the `class_id` type registered earlier.
    pub fn object(mut self, path_id: i64, class_id: i32, data: Vec<u8>) -> Self {
        let type_index = self
            .types
            .iter()
            .position(|t| t.class_id == class_id)
            .unwrap_or_else(|| panic!("class {class_id} not registered")) as i32;
        self.objects.push(ObjectDef { path_id, type_index, data });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut meta = Vec::new();
        cstr(&mut meta, &self.version);
        meta.write_i32::<LittleEndian>(self.platform).unwrap();
        meta.push(self.type_trees as u8);

        meta.write_i32::<LittleEndian>(self.types.len() as i32).unwrap();
        for (i, ty) in self.types.iter().enumerate() {
            meta.write_i32::<LittleEndian>(ty.class_id).unwrap();
            meta.push(0);
            meta.write_i16::<LittleEndian>(-1).unwrap();
            if ty.class_id == 114 {
                meta.extend_from_slice(&[0; 16]);
            }
            meta.extend_from_slice(&[i as u8 + 1; 16]);
            if self.type_trees {
                write_blob(&mut meta, &ty.nodes);
            }
        }

        // data section layout, objects aligned to 8
        let mut data = Vec::new();
        let mut starts = Vec::with_capacity(self.objects.len());
        for obj in &self.objects {
            while data.len() % 8 != 0 {
                data.push(0);
            }
            starts.push(data.len() as u32);
            data.extend_from_slice(&obj.data);
        }

        meta.write_i32::<LittleEndian>(self.objects.len() as i32).unwrap();
        for (obj, start) in self.objects.iter().zip(&starts) {
            while (HEADER_SIZE + meta.len()) % 4 != 0 {
                meta.push(0);
            }
            meta.write_i64::<LittleEndian>(obj.path_id).unwrap();
            meta.write_u32::<LittleEndian>(*start).unwrap();
            meta.write_u32::<LittleEndian>(obj.data.len() as u32).unwrap();
            meta.write_i32::<LittleEndian>(obj.type_index).unwrap();
        }

        // scripts
        meta.write_i32::<LittleEndian>(0).unwrap();

        meta.write_i32::<LittleEndian>(self.externals.len() as i32).unwrap();
        for path in &self.externals {
            cstr(&mut meta, "");
            meta.extend_from_slice(&[0x11; 16]);
            meta.write_i32::<LittleEndian>(0).unwrap();
            cstr(&mut meta, path);
        }
        cstr(&mut meta, "");

        let data_offset = (HEADER_SIZE + meta.len() + 15) / 16 * 16;
        let file_size = data_offset + data.len();
        let mut out = Vec::with_capacity(file_size);
        out.write_u32::<BigEndian>(meta.len() as u32).unwrap();
        out.write_u32::<BigEndian>(file_size as u32).unwrap();
        out.write_u32::<BigEndian>(17).unwrap();
        out.write_u32::<BigEndian>(data_offset as u32).unwrap();
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&meta);
        out.resize(data_offset, 0);
        out.extend_from_slice(&data);
        out
    }
}

fn cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Blob-format schema with every string in the local buffer.
fn write_blob(out: &mut Vec<u8>, nodes: &[Node]) {
    fn offset_of(s: &str, strings: &mut Vec<u8>) -> u32 {
        let at = strings.len() as u32;
        cstr(strings, s);
        at
    }
    let mut strings = Vec::new();
    let mut encoded = Vec::new();
    for (index, &(level, ty, name, size, is_array, meta)) in nodes.iter().enumerate() {
        let type_off = offset_of(ty, &mut strings);
        let name_off = offset_of(name, &mut strings);
        encoded.write_u16::<LittleEndian>(1).unwrap();
        encoded.push(level);
        encoded.push(is_array as u8);
        encoded.write_u32::<LittleEndian>(type_off).unwrap();
        encoded.write_u32::<LittleEndian>(name_off).unwrap();
        encoded.write_i32::<LittleEndian>(size).unwrap();
        encoded.write_i32::<LittleEndian>(index as i32).unwrap();
        encoded.write_i32::<LittleEndian>(meta).unwrap();
    }
    out.write_i32::<LittleEndian>(nodes.len() as i32).unwrap();
    out.write_i32::<LittleEndian>(strings.len() as i32).unwrap();
    out.extend_from_slice(&encoded);
    out.extend_from_slice(&strings);
}

/// UnityFS bundle with one data block holding `files` back to back.
pub fn build_bundle(revision: &str, files: &[(&str, &[u8])], lz4: bool) -> Vec<u8> {
    let payload: Vec<u8> = files.iter().flat_map(|(_, d)| d.iter().copied()).collect();
    let (block, block_flags) = if lz4 {
        (lz4_flex::block::compress(&payload), 2u16)
    } else {
        (payload.clone(), 0u16)
    };

    let mut info = vec![0u8; 16];
    info.write_i32::<BigEndian>(1).unwrap();
    info.write_u32::<BigEndian>(payload.len() as u32).unwrap();
    info.write_u32::<BigEndian>(block.len() as u32).unwrap();
    info.write_u16::<BigEndian>(block_flags).unwrap();
    info.write_i32::<BigEndian>(files.len() as i32).unwrap();
    let mut offset = 0i64;
    for (name, data) in files {
        info.write_i64::<BigEndian>(offset).unwrap();
        info.write_i64::<BigEndian>(data.len() as i64).unwrap();
        info.write_u32::<BigEndian>(4).unwrap();
        info.write_all(name.as_bytes()).unwrap();
        info.push(0);
        offset += data.len() as i64;
    }

    let mut out = Vec::new();
    out.write_all(b"UnityFS\0").unwrap();
    out.write_u32::<BigEndian>(6).unwrap();
    out.write_all(b"5.x.x\0").unwrap();
    cstr(&mut out, revision);
    let size_at = out.len();
    out.write_i64::<BigEndian>(0).unwrap();
    out.write_u32::<BigEndian>(info.len() as u32).unwrap();
    out.write_u32::<BigEndian>(info.len() as u32).unwrap();
    out.write_u32::<BigEndian>(0).unwrap();
    out.extend_from_slice(&info);
    out.extend_from_slice(&block);
    let total = out.len() as i64;
    out[size_at..size_at + 8].copy_from_slice(&total.to_be_bytes());
    out
}

/// GameObject payload for player builds since 5.5.
pub fn game_object(name: &str, components: &[(i32, i64)], layer: i32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.i32(components.len() as i32);
    for &(file_id, path_id) in components {
        w.pptr(file_id, path_id);
    }
    w.i32(layer).string(name);
    w.finish()
}

/// Transform payload with no children.
pub fn transform(game_object: (i32, i64), position: [f32; 3], father: (i32, i64)) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.pptr(game_object.0, game_object.1)
        .f32s(&[0.0, 0.0, 0.0, 1.0])
        .f32s(&position)
        .f32s(&[1.0, 1.0, 1.0])
        .i32(0)
        .pptr(father.0, father.1);
    w.finish()
}
