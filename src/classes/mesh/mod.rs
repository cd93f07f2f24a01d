//! Mesh decoder.
//!
//! A mesh stores its vertices either as an explicit [`VertexData`] layout
//! (optionally streamed from a resource file) or as a [`CompressedMesh`].
//! Decoding reads the versioned field layout, then rebuilds flat attribute
//! arrays and a triangle list from whichever form is present.
//!
//! # Layout brackets
//!
//! | Version     | Change                                             |
//! |-------------|----------------------------------------------------|
//! | < 3.5       | Vertex attributes stored as plain arrays           |
//! | 2.6         | Compressed meshes, index buffer after compression  |
//! | 4.1 / 4.3   | Blend shapes, then the 4.3 shape/channel layout    |
//! | 2017.3      | Per-submesh base vertex, 32-bit index format       |
//! | 2018        | Channel table reordered (eight UV sets)            |
//! | 2018.3      | Vertex data may be streamed from a resource file   |

mod compressed;
mod topology;
mod vertex;

pub use compressed::{unpack_normal, unpack_skin, CompressedMesh};
pub use topology::{destripify, quads_to_triangles, triangulate, SubMesh, Topology};
pub use vertex::{ChannelInfo, ChannelValues, StreamInfo, VertexAttribute, VertexData, VertexFormat};

use tracing::debug;

use super::base::{read_named, StreamingInfo};
use super::layout::{run_steps, FieldStep};
use super::DecodeContext;
use crate::serialized::ObjectReader;
use crate::util::{ver, ver1, Aabb, Mat4, Result, UnityVersion, Vec3, VersionGate};
use vertex::{fill_skin, has_index_format};

/// Up to four bone influences per vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoneWeights4 {
    pub weight: [f32; 4],
    pub bone_index: [i32; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlendShapeVertex {
    pub vertex: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBlendShape {
    /// Pre-4.3 shapes carry their own name.
    pub name: Option<String>,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub has_normals: bool,
    pub has_tangents: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBlendShapeChannel {
    pub name: String,
    pub name_hash: u32,
    pub frame_index: i32,
    pub frame_count: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendShapeData {
    pub vertices: Vec<BlendShapeVertex>,
    pub shapes: Vec<MeshBlendShape>,
    pub channels: Vec<MeshBlendShapeChannel>,
    pub full_weights: Vec<f32>,
}

impl BlendShapeData {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let modern = r.version().at_least(ver(4, 3));
        let mut data = BlendShapeData::default();
        if modern {
            data.vertices = read_shape_vertices(r)?;
            let count = r.read_count(12)?;
            for _ in 0..count {
                data.shapes.push(read_shape(r, true)?);
            }
            data.channels = r.read_array(16, |r| {
                Ok(MeshBlendShapeChannel {
                    name: r.read_aligned_string()?,
                    name_hash: r.read_u32()?,
                    frame_index: r.read_i32()?,
                    frame_count: r.read_i32()?,
                })
            })?;
            data.full_weights = r.read_f32_array()?;
        } else {
            let count = r.read_count(8)?;
            for _ in 0..count {
                data.shapes.push(read_shape(r, false)?);
            }
            r.align(4)?;
            data.vertices = read_shape_vertices(r)?;
        }
        Ok(data)
    }
}

fn read_shape_vertices(r: &mut ObjectReader<'_>) -> Result<Vec<BlendShapeVertex>> {
    r.read_array(40, |r| {
        Ok(BlendShapeVertex {
            vertex: r.read_vec3()?,
            normal: r.read_vec3()?,
            tangent: r.read_vec3()?,
            index: r.read_u32()?,
        })
    })
}

fn read_shape(r: &mut ObjectReader<'_>, modern: bool) -> Result<MeshBlendShape> {
    let name = if modern { None } else { Some(r.read_aligned_string()?) };
    let first_vertex = r.read_u32()?;
    let vertex_count = r.read_u32()?;
    if !modern {
        let _aabb_min_delta = r.read_vec3()?;
        let _aabb_max_delta = r.read_vec3()?;
    }
    let has_normals = r.read_bool()?;
    let has_tangents = r.read_bool()?;
    if modern {
        r.align(4)?;
    }
    Ok(MeshBlendShape { name, first_vertex, vertex_count, has_normals, has_tangents })
}

/// Decoded mesh with flat attribute arrays.
///
/// Attribute arrays are interleaved per vertex; their dimension is
/// `len / vertex_count`.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub use_16bit_indices: bool,
    pub sub_meshes: Vec<SubMesh>,
    pub shapes: Option<BlendShapeData>,
    pub bind_pose: Vec<Mat4>,
    pub bone_name_hashes: Vec<u32>,
    pub root_bone_name_hash: u32,
    pub mesh_compression: u8,
    pub is_readable: bool,
    pub index_format: Option<i32>,
    /// Raw index buffer as stored.
    pub index_buffer: Vec<u32>,
    pub vertex_data: Option<VertexData>,
    pub compressed_mesh: Option<CompressedMesh>,
    pub local_aabb: Aabb,
    pub mesh_usage_flags: i32,
    pub stream_data: Option<StreamingInfo>,

    pub vertex_count: usize,
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub tangents: Vec<f32>,
    pub colors: Vec<f32>,
    pub uv: [Vec<f32>; 8],
    pub skin: Vec<BoneWeights4>,
    /// Triangle list over every submesh.
    pub indices: Vec<u32>,
}

fn read_index_buffer(r: &mut ObjectReader<'_>, mesh: &mut Mesh) -> Result<()> {
    let size = r.read_count(1)?;
    if mesh.use_16bit_indices {
        mesh.index_buffer = r.read_n(size / 2, |r| r.read_u16().map(u32::from))?;
        r.align(4)?;
    } else {
        mesh.index_buffer = r.read_n(size / 4, |r| r.read_u32())?;
    }
    Ok(())
}

fn read_skin(r: &mut ObjectReader<'_>) -> Result<Vec<BoneWeights4>> {
    r.read_array(32, |r| {
        let mut w = BoneWeights4::default();
        for x in &mut w.weight {
            *x = r.read_f32()?;
        }
        for i in &mut w.bone_index {
            *i = r.read_i32()?;
        }
        Ok(w)
    })
}

/// Counted array of `dim`-component floats.
fn read_float_tuples(r: &mut ObjectReader<'_>, dim: usize) -> Result<Vec<f32>> {
    let count = r.read_count(4 * dim)?;
    r.read_n(count * dim, |r| r.read_f32())
}

const MESH_LAYOUT: &[FieldStep<Mesh>] = &[
    FieldStep::new("m_Use16BitIndices", VersionGate::Before(ver(3, 5)), |r, m| {
        m.use_16bit_indices = r.read_i32()? > 0;
        Ok(())
    }),
    FieldStep::new("m_IndexBuffer (2.5)", VersionGate::UpTo(ver(2, 5)), read_index_buffer),
    FieldStep::new("m_SubMeshes", VersionGate::Always, |r, m| {
        let count = r.read_count(12)?;
        for _ in 0..count {
            m.sub_meshes.push(SubMesh::read(r)?);
        }
        Ok(())
    }),
    FieldStep::new("m_Shapes", VersionGate::Since(ver(4, 1)), |r, m| {
        m.shapes = Some(BlendShapeData::read(r)?);
        Ok(())
    }),
    FieldStep::new("m_BindPose", VersionGate::Since(ver(4, 3)), |r, m| {
        m.bind_pose = r.read_mat4_array()?;
        m.bone_name_hashes = r.read_u32_array()?;
        m.root_bone_name_hash = r.read_u32()?;
        Ok(())
    }),
    FieldStep::new("m_BonesAABB", VersionGate::Since(ver1(2019)), |r, _| {
        let _bones_aabb = r.read_array(24, |r| Ok((r.read_vec3()?, r.read_vec3()?)))?;
        let _variable_bone_count_weights = r.read_u32_array()?;
        Ok(())
    }),
    FieldStep::new("m_MeshCompression", VersionGate::Since(ver(2, 6)), |r, m| {
        m.mesh_compression = r.read_u8()?;
        if r.version().at_least(ver1(4)) {
            if r.version().below(ver1(5)) {
                let _stream_compression = r.read_u8()?;
            }
            m.is_readable = r.read_bool()?;
            let _keep_vertices = r.read_bool()?;
            let _keep_indices = r.read_bool()?;
        }
        r.align(4)?;
        if has_index_format(r.version(), m.mesh_compression) {
            let format = r.read_i32()?;
            m.index_format = Some(format);
            m.use_16bit_indices = format == 0;
        }
        read_index_buffer(r, m)
    }),
    FieldStep::new("m_Vertices (legacy)", VersionGate::Before(ver(3, 5)), |r, m| {
        m.vertices = read_float_tuples(r, 3)?;
        m.vertex_count = m.vertices.len() / 3;
        m.skin = read_skin(r)?;
        m.bind_pose = r.read_mat4_array()?;
        m.uv[0] = read_float_tuples(r, 2)?;
        m.uv[1] = read_float_tuples(r, 2)?;
        if r.version().at_most(ver(2, 5)) {
            let count = r.read_count(28)?;
            for _ in 0..count {
                let n = r.read_vec3()?;
                let t = r.read_vec3()?;
                let handedness = r.read_f32()?;
                m.normals.extend_from_slice(&n.to_array());
                m.tangents.extend_from_slice(&[t.x, t.y, t.z, handedness]);
            }
        } else {
            m.tangents = read_float_tuples(r, 4)?;
            m.normals = read_float_tuples(r, 3)?;
        }
        Ok(())
    }),
    FieldStep::new("m_Skin", VersionGate::Between(ver(3, 5), ver(2018, 2)), |r, m| {
        m.skin = read_skin(r)?;
        Ok(())
    }),
    FieldStep::new("m_BindPose (4.2)", VersionGate::Custom(|v| v.at_least(ver(3, 5)) && v.at_most(ver(4, 2))), |r, m| {
        m.bind_pose = r.read_mat4_array()?;
        Ok(())
    }),
    FieldStep::new("m_VertexData", VersionGate::Since(ver(3, 5)), |r, m| {
        m.vertex_data = Some(VertexData::read(r)?);
        Ok(())
    }),
    FieldStep::new("m_CompressedMesh", VersionGate::Since(ver(2, 6)), |r, m| {
        m.compressed_mesh = Some(CompressedMesh::read(r)?);
        Ok(())
    }),
    FieldStep::new("m_LocalAABB", VersionGate::Always, |r, m| {
        m.local_aabb = r.read_aabb()?;
        Ok(())
    }),
    FieldStep::new("m_Colors (legacy)", VersionGate::UpTo(ver(3, 4)), |r, m| {
        let count = r.read_count(4)?;
        m.colors = r.read_n(count * 4, |r| Ok(r.read_u8()? as f32 / 255.0))?;
        let collision_triangles = r.read_count(4)?;
        r.skip(collision_triangles * 4)?;
        let _collision_vertex_count = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_MeshUsageFlags", VersionGate::Always, |r, m| {
        m.mesh_usage_flags = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_CookingOptions", VersionGate::Since(ver(2022, 1)), |r, _| {
        r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_BakedCollisionMesh", VersionGate::Since(ver1(5)), |r, _| {
        r.read_byte_array()?;
        r.align(4)?;
        r.read_byte_array()?;
        r.align(4)
    }),
    FieldStep::new("m_MeshMetrics", VersionGate::Since(ver(2018, 2)), |r, _| {
        r.skip(8)
    }),
    FieldStep::new("m_StreamData", VersionGate::Since(ver(2018, 3)), |r, m| {
        r.align(4)?;
        m.stream_data = Some(StreamingInfo::read(r)?);
        Ok(())
    }),
];

impl Mesh {
    pub fn read(r: &mut ObjectReader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
        let mut mesh = Mesh { name: read_named(r)?, use_16bit_indices: true, ..Default::default() };
        run_steps(MESH_LAYOUT, r, &mut mesh)?;
        mesh.load_stream_data(r, ctx)?;
        mesh.process(r.version(), r.endian())?;
        Ok(mesh)
    }

    /// Replace inline vertex bytes with the streamed copy.
    fn load_stream_data(&mut self, r: &ObjectReader<'_>, ctx: &DecodeContext<'_>) -> Result<()> {
        let (Some(info), Some(vd)) = (&self.stream_data, &mut self.vertex_data) else {
            return Ok(());
        };
        if info.is_empty() || vd.vertex_count == 0 {
            return Ok(());
        }
        debug!(mesh = %self.name, path = %info.path, size = info.size, "reading streamed vertex data");
        vd.data = ctx.read_resource(r.file, info)?;
        Ok(())
    }

    /// Rebuild attribute arrays and the triangle list.
    pub fn process(&mut self, version: &UnityVersion, endian: crate::stream::Endian) -> Result<()> {
        if version.at_least(ver(3, 5)) {
            self.read_vertex_channels(version, endian)?;
        }
        if version.at_least(ver(2, 6)) {
            if let Some(cm) = self.compressed_mesh.take() {
                let result = cm.decompress_into(self, version);
                self.compressed_mesh = Some(cm);
                result?;
            }
        }
        self.indices = triangulate(&mut self.sub_meshes, &self.index_buffer, self.use_16bit_indices, version)?;
        Ok(())
    }

    fn read_vertex_channels(&mut self, version: &UnityVersion, endian: crate::stream::Endian) -> Result<()> {
        let Some(vd) = &self.vertex_data else {
            return Ok(());
        };
        let count = vd.vertex_count as usize;
        let channels = vd.extract(version, endian)?;
        self.vertex_count = count;
        for (attribute, dimension, values) in channels {
            match attribute {
                VertexAttribute::Position => self.vertices = values.into_floats(),
                VertexAttribute::Normal => self.normals = values.into_floats(),
                VertexAttribute::Tangent => self.tangents = values.into_floats(),
                VertexAttribute::Color => self.colors = values.into_floats(),
                VertexAttribute::Uv(i) => self.uv[i] = values.into_floats(),
                VertexAttribute::BlendWeight => fill_skin(&mut self.skin, count, dimension, values, true),
                VertexAttribute::BlendIndices => fill_skin(&mut self.skin, count, dimension, values, false),
            }
        }
        Ok(())
    }

    /// Components per vertex of an attribute array (0 when absent).
    pub fn dimension_of(&self, values: &[f32]) -> usize {
        if self.vertex_count == 0 {
            0
        } else {
            values.len() / self.vertex_count
        }
    }
}
