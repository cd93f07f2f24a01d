//! Quantized mesh payloads (`CompressedMesh`).

use super::{BoneWeights4, Mesh};
use crate::classes::packed::{PackedFloatVector, PackedIntVector};
use crate::serialized::ObjectReader;
use crate::util::{ver, ver1, Error, Mat4, Result, UnityVersion, Vec3};

const UV_INFO_BITS: u32 = 4;
const UV_DIMENSION_MASK: u32 = 3;
const UV_CHANNEL_EXISTS: u32 = 4;
const MAX_UV_CHANNELS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedMesh {
    pub vertices: PackedFloatVector,
    pub uv: PackedFloatVector,
    /// Before 5.0 only.
    pub bind_poses: Option<PackedFloatVector>,
    pub normals: PackedFloatVector,
    pub tangents: PackedFloatVector,
    pub weights: PackedIntVector,
    pub normal_signs: PackedIntVector,
    pub tangent_signs: PackedIntVector,
    /// 5.0 and later.
    pub float_colors: Option<PackedFloatVector>,
    pub bone_indices: PackedIntVector,
    pub triangles: PackedIntVector,
    /// 3.5 up to 5.0.
    pub colors: Option<PackedIntVector>,
    /// Per-UV-channel presence and dimension, 4 bits each (5.0 and later).
    pub uv_info: u32,
}

impl CompressedMesh {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut cm = CompressedMesh {
            vertices: PackedFloatVector::read(r)?,
            uv: PackedFloatVector::read(r)?,
            ..Default::default()
        };
        if version.below(ver1(5)) {
            cm.bind_poses = Some(PackedFloatVector::read(r)?);
        }
        cm.normals = PackedFloatVector::read(r)?;
        cm.tangents = PackedFloatVector::read(r)?;
        cm.weights = PackedIntVector::read(r)?;
        cm.normal_signs = PackedIntVector::read(r)?;
        cm.tangent_signs = PackedIntVector::read(r)?;
        if version.at_least(ver1(5)) {
            cm.float_colors = Some(PackedFloatVector::read(r)?);
        }
        cm.bone_indices = PackedIntVector::read(r)?;
        cm.triangles = PackedIntVector::read(r)?;
        if version.at_least(ver(3, 5)) {
            if version.below(ver1(5)) {
                cm.colors = Some(PackedIntVector::read(r)?);
            } else {
                cm.uv_info = r.read_u32()?;
            }
        }
        Ok(cm)
    }

    /// Rebuild every attribute present in the packed vectors into `mesh`.
    pub fn decompress_into(&self, mesh: &mut Mesh, version: &UnityVersion) -> Result<()> {
        if self.vertices.num_items > 0 {
            mesh.vertex_count = self.vertices.num_items as usize / 3;
            mesh.vertices = self.vertices.unpack_floats(3, 0, None)?;
        }
        let vertex_count = mesh.vertex_count;

        if self.uv.num_items > 0 {
            if self.uv_info != 0 {
                let mut src = 0;
                for channel in 0..MAX_UV_CHANNELS {
                    let bits = (self.uv_info >> (channel as u32 * UV_INFO_BITS)) & ((1 << UV_INFO_BITS) - 1);
                    if bits & UV_CHANNEL_EXISTS == 0 {
                        continue;
                    }
                    let dim = 1 + (bits & UV_DIMENSION_MASK) as usize;
                    mesh.uv[channel] = self.uv.unpack_floats(dim, src, Some(vertex_count))?;
                    src += dim * vertex_count;
                }
            } else {
                mesh.uv[0] = self.uv.unpack_floats(2, 0, Some(vertex_count))?;
                if self.uv.num_items as usize >= vertex_count * 4 {
                    mesh.uv[1] = self.uv.unpack_floats(2, vertex_count * 2, Some(vertex_count))?;
                }
            }
        }

        if version.below(ver1(5)) {
            if let Some(bind_poses) = self.bind_poses.as_ref().filter(|b| b.num_items > 0) {
                let cells = bind_poses.unpack_floats(16, 0, None)?;
                mesh.bind_pose = cells
                    .chunks_exact(16)
                    .map(|c| {
                        let mut m = [0f32; 16];
                        m.copy_from_slice(c);
                        Mat4::from_cols_array(&m)
                    })
                    .collect();
            }
        }

        if self.normals.num_items > 0 {
            let xy = self.normals.unpack_floats(2, 0, None)?;
            let signs = self.normal_signs.unpack_ints()?;
            let count = self.normals.num_items as usize / 2;
            mesh.normals = Vec::with_capacity(count * 3);
            for i in 0..count {
                let sign = signs.get(i).copied().unwrap_or(1);
                let n = unpack_normal(xy[i * 2], xy[i * 2 + 1], sign != 0);
                mesh.normals.extend_from_slice(&n.to_array());
            }
        }

        if self.tangents.num_items > 0 {
            let xy = self.tangents.unpack_floats(2, 0, None)?;
            let signs = self.tangent_signs.unpack_ints()?;
            let count = self.tangents.num_items as usize / 2;
            mesh.tangents = Vec::with_capacity(count * 4);
            for i in 0..count {
                let z_sign = signs.get(i * 2).copied().unwrap_or(1);
                let w_sign = signs.get(i * 2 + 1).copied().unwrap_or(1);
                let t = unpack_normal(xy[i * 2], xy[i * 2 + 1], z_sign != 0);
                mesh.tangents.extend_from_slice(&[t.x, t.y, t.z, if w_sign > 0 { 1.0 } else { -1.0 }]);
            }
        }

        if version.at_least(ver1(5)) {
            if let Some(colors) = self.float_colors.as_ref().filter(|c| c.num_items > 0) {
                mesh.colors = colors.unpack_floats(1, 0, None)?;
            }
        }

        if self.weights.num_items > 0 {
            let weights = self.weights.unpack_ints()?;
            let indices = self.bone_indices.unpack_ints()?;
            mesh.skin = unpack_skin(&weights, &indices, vertex_count)?;
        }

        if self.triangles.num_items > 0 {
            mesh.index_buffer = self.triangles.unpack_ints()?.into_iter().map(|x| x as u32).collect();
        }

        if let Some(colors) = self.colors.as_ref().filter(|c| c.num_items > 0) {
            // one RGBA32 per item, unpacked as four byte-sized lanes
            let lanes = PackedIntVector {
                num_items: colors.num_items * 4,
                data: colors.data.clone(),
                bit_size: colors.bit_size / 4,
            };
            mesh.colors = lanes.unpack_ints()?.into_iter().map(|c| c as f32 / 255.0).collect();
        }
        Ok(())
    }
}

/// Rebuild a unit vector from its packed `x`, `y` and the sign of `z`.
///
/// Quantization can push `x² + y²` past one; the vector is then
/// normalized in the xy plane instead of producing a NaN `z`.
pub fn unpack_normal(x: f32, y: f32, positive_z: bool) -> Vec3 {
    let zsqr = 1.0 - x * x - y * y;
    let n = if zsqr >= 0.0 {
        Vec3::new(x, y, zsqr.sqrt())
    } else {
        Vec3::new(x, y, 0.0).normalize_or_zero()
    };
    if positive_z {
        n
    } else {
        Vec3::new(n.x, n.y, -n.z)
    }
}

/// Decode run-length skin weights in 1/31 steps.
///
/// Weights for a vertex are read until they sum to 31; remaining slots are
/// zeroed. If three weights are read without reaching 31, the fourth is the
/// remainder and its bone index is read explicitly.
pub fn unpack_skin(weights: &[i32], bone_indices: &[i32], vertex_count: usize) -> Result<Vec<BoneWeights4>> {
    let mut skin = vec![BoneWeights4::default(); vertex_count];
    let mut indices = bone_indices.iter().copied();
    let mut next_index = || indices.next().ok_or_else(|| Error::invalid("compressed skin runs out of bone indices"));
    let (mut vertex, mut j, mut sum) = (0usize, 0usize, 0i32);

    for &w in weights {
        let slot = skin.get_mut(vertex).ok_or_else(|| Error::invalid("compressed skin has more weights than vertices"))?;
        slot.weight[j] = w as f32 / 31.0;
        slot.bone_index[j] = next_index()?;
        j += 1;
        sum += w;

        if sum >= 31 {
            for k in j..4 {
                slot.weight[k] = 0.0;
                slot.bone_index[k] = 0;
            }
            vertex += 1;
            j = 0;
            sum = 0;
        } else if j == 3 {
            slot.weight[3] = (31 - sum) as f32 / 31.0;
            slot.bone_index[3] = next_index()?;
            vertex += 1;
            j = 0;
            sum = 0;
        }
    }
    Ok(skin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::packed::tests::{pack_floats, pack_ints};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normal_unit_length() {
        for (x, y) in [(0.0, 0.0), (0.6, 0.0), (0.3, -0.4), (-0.70, 0.71)] {
            let n = unpack_normal(x, y, true);
            assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-5);
            assert!(n.z >= 0.0);
            assert!(unpack_normal(x, y, false).z <= 0.0);
        }
    }

    #[test]
    fn test_noisy_normal_falls_back() {
        let n = unpack_normal(0.8, 0.7, true);
        assert!(!n.z.is_nan());
        assert_eq!(n.z, 0.0);
        assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_skin_weights() {
        // v0: 31 -> single bone; v1: 10+10+5 -> implied 6; v2: 20+11
        let weights = [31, 10, 10, 5, 20, 11];
        let indices = [4, 1, 2, 3, 9, 7, 8];
        let skin = unpack_skin(&weights, &indices, 3).unwrap();

        assert_eq!(skin[0].bone_index, [4, 0, 0, 0]);
        assert_eq!(skin[0].weight, [1.0, 0.0, 0.0, 0.0]);

        assert_eq!(skin[1].bone_index, [1, 2, 3, 9]);
        assert_abs_diff_eq!(skin[1].weight[3], 6.0 / 31.0);
        assert_abs_diff_eq!(skin[1].weight.iter().sum::<f32>(), 1.0, epsilon = 1e-6);

        assert_eq!(skin[2].bone_index, [7, 8, 0, 0]);
        assert_abs_diff_eq!(skin[2].weight[1], 11.0 / 31.0);
    }

    #[test]
    fn test_skin_overflow_is_error() {
        assert!(unpack_skin(&[31, 31], &[0, 1], 1).is_err());
        assert!(unpack_skin(&[10, 10, 5], &[0, 1, 2], 1).is_err());
    }

    #[test]
    fn test_decompress_positions_and_uvs() {
        let version: UnityVersion = "2019.4.0f1".parse().unwrap();
        let positions = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        // channel 0: 2D, channel 2: 3D  -> bits 0b0101 | 0b0110 << 8
        let uv0 = [0.0, 0.5, 1.0, 0.25];
        let uv2 = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let uv: Vec<f32> = uv0.iter().chain(uv2.iter()).copied().collect();
        let cm = CompressedMesh {
            vertices: pack_floats(&positions, 16, 0.0, 5.0),
            uv: pack_floats(&uv, 16, 0.0, 1.0),
            triangles: pack_ints(&[0, 1, 0], 2),
            uv_info: 0b0101 | (0b0110 << 8),
            ..Default::default()
        };
        let mut mesh = Mesh::default();
        cm.decompress_into(&mut mesh, &version).unwrap();

        assert_eq!(mesh.vertex_count, 2);
        assert_eq!(mesh.vertices.len(), 6);
        assert_abs_diff_eq!(mesh.vertices[4], 4.0, epsilon = 1e-3);
        assert_eq!(mesh.uv[0].len(), 4);
        assert!(mesh.uv[1].is_empty());
        assert_eq!(mesh.uv[2].len(), 6);
        assert_abs_diff_eq!(mesh.uv[2][5], 0.6, epsilon = 1e-3);
        assert_eq!(mesh.index_buffer, [0, 1, 0]);
    }

    #[test]
    fn test_decompress_legacy_colors() {
        let version: UnityVersion = "4.7.2f1".parse().unwrap();
        // one RGBA32 color, 32 bits -> four 8-bit lanes
        let rgba = u32::from_le_bytes([255, 0, 51, 255]);
        let cm = CompressedMesh { colors: Some(pack_ints(&[rgba], 32)), ..Default::default() };
        let mut mesh = Mesh::default();
        cm.decompress_into(&mut mesh, &version).unwrap();
        assert_eq!(mesh.colors.len(), 4);
        assert_abs_diff_eq!(mesh.colors[2], 0.2, epsilon = 1e-6);
    }
}
