//! Submeshes and triangle-list reconstruction.

use crate::serialized::ObjectReader;
use crate::util::{ver, ver1, Aabb, Error, Result, UnityVersion};

/// `GfxPrimitiveType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Quads,
    Lines,
    LineStrip,
    Points,
    Unknown(i32),
}

impl From<i32> for Topology {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Triangles,
            1 => Self::TriangleStrip,
            2 => Self::Quads,
            3 => Self::Lines,
            4 => Self::LineStrip,
            5 => Self::Points,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    pub first_byte: u32,
    /// Triangle-list index count once the mesh is decoded.
    pub index_count: u32,
    pub topology: Topology,
    pub triangle_count: u32,
    pub base_vertex: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub local_aabb: Aabb,
}

impl SubMesh {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let first_byte = r.read_u32()?;
        let index_count = r.read_u32()?;
        let topology = Topology::from(r.read_i32()?);
        let triangle_count = if version.below(ver1(4)) { r.read_u32()? } else { 0 };
        let base_vertex = if version.at_least(ver(2017, 3)) { r.read_u32()? } else { 0 };
        let (first_vertex, vertex_count, local_aabb) = if version.at_least(ver1(3)) {
            (r.read_u32()?, r.read_u32()?, r.read_aabb()?)
        } else {
            (0, 0, Aabb::default())
        };
        Ok(Self {
            first_byte,
            index_count,
            topology,
            triangle_count,
            base_vertex,
            first_vertex,
            vertex_count,
            local_aabb,
        })
    }
}

/// Convert a strip to a triangle list, dropping degenerate triangles and
/// flipping the winding of every odd triangle.
pub fn destripify(strip: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(strip.len().saturating_sub(2) * 3);
    for (i, w) in strip.windows(3).enumerate() {
        let (a, b, c) = (w[0], w[1], w[2]);
        if a == b || a == c || b == c {
            continue;
        }
        if i & 1 == 1 {
            out.extend_from_slice(&[b, a, c]);
        } else {
            out.extend_from_slice(&[a, b, c]);
        }
    }
    out
}

/// Split each quad into two triangles.
pub fn quads_to_triangles(quads: &[u32]) -> Vec<u32> {
    quads.chunks_exact(4).flat_map(|q| [q[0], q[1], q[2], q[0], q[2], q[3]]).collect()
}

/// Build the triangle list for every submesh, rewriting each submesh's
/// index count to its triangle-list equivalent.
///
/// Pre-4.0 meshes store every non-list submesh as a strip.
pub fn triangulate(sub_meshes: &mut [SubMesh], index_buffer: &[u32], use_16bit: bool, version: &UnityVersion) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for (n, sub) in sub_meshes.iter_mut().enumerate() {
        let mut first = sub.first_byte as usize / 2;
        if !use_16bit {
            first /= 2;
        }
        let count = sub.index_count as usize;
        let range = index_buffer.get(first..first + count).ok_or_else(|| {
            Error::invalid(format!("submesh {n} indexes past the index buffer ({first}+{count} > {})", index_buffer.len()))
        })?;

        match sub.topology {
            Topology::Triangles => {
                indices.extend_from_slice(&range[..count - count % 3]);
            }
            topology if topology == Topology::TriangleStrip || version.below(ver1(4)) => {
                let tris = destripify(range);
                sub.index_count = tris.len() as u32;
                indices.extend(tris);
            }
            Topology::Quads => {
                indices.extend(quads_to_triangles(range));
                sub.index_count = (count / 2 * 3) as u32;
            }
            other => return Err(Error::UnsupportedTopology(format!("{other:?} in submesh {n}"))),
        }
    }
    Ok(indices)
}
