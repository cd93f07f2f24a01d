//! Quantized, bit-packed arrays used by compressed meshes and clips.
//!
//! Fields are packed LSB-first inside each byte and run on across byte
//! boundaries (see the `bitpack` crate).

use bitpack::BitReader;

use super::layout::{FromTree, TreeFields};
use crate::serialized::ObjectReader;
use crate::tree::Value;
use crate::util::{Error, Quat, Result};

#[inline]
fn max_value(bits: u32) -> f32 {
    ((1u64 << bits) - 1) as f32
}

fn truncated(kind: &str) -> Error {
    Error::invalid(format!("{kind} data shorter than its item count"))
}

/// Floats quantized to `bit_size` bits over `[start, start + range]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedFloatVector {
    pub num_items: u32,
    pub range: f32,
    pub start: f32,
    pub data: Vec<u8>,
    pub bit_size: u8,
}

impl PackedFloatVector {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let num_items = r.read_u32()?;
        let range = r.read_f32()?;
        let start = r.read_f32()?;
        let data = r.read_byte_array()?.to_vec();
        r.align(4)?;
        let bit_size = r.read_u8()?;
        r.align(4)?;
        Ok(Self { num_items, range, start, data, bit_size })
    }

    /// Unpack `num_chunks` chunks of `items_per_chunk` values, beginning
    /// `start` items into the buffer. `None` unpacks every whole chunk.
    ///
    /// A zero bit width stores no data; every item equals `start`.
    pub fn unpack_floats(&self, items_per_chunk: usize, start: usize, num_chunks: Option<usize>) -> Result<Vec<f32>> {
        if items_per_chunk == 0 {
            return Ok(Vec::new());
        }
        let chunks = num_chunks.unwrap_or(self.num_items as usize / items_per_chunk);
        let count = chunks * items_per_chunk;
        let bits = self.bit_size as u32;
        if bits == 0 {
            return Ok(vec![self.start; count]);
        }

        let step = self.range / max_value(bits);
        let mut reader = BitReader::at_bit(&self.data, bits as usize * start);
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let x = reader.read(bits).ok_or_else(|| truncated("PackedFloatVector"))?;
            out.push(x as f32 * step + self.start);
        }
        Ok(out)
    }

    /// Every item, one per chunk.
    pub fn unpack_all(&self) -> Result<Vec<f32>> {
        self.unpack_floats(1, 0, None)
    }
}

impl FromTree for PackedFloatVector {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            num_items: v.u32_of("m_NumItems")?,
            range: v.f32_of("m_Range")?,
            start: v.f32_of("m_Start")?,
            data: v.bytes_of("m_Data")?,
            bit_size: v.u32_of("m_BitSize")? as u8,
        })
    }
}

/// Unsigned integers packed at `bit_size` bits each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedIntVector {
    pub num_items: u32,
    pub data: Vec<u8>,
    pub bit_size: u8,
}

impl PackedIntVector {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let num_items = r.read_u32()?;
        let data = r.read_byte_array()?.to_vec();
        r.align(4)?;
        let bit_size = r.read_u8()?;
        r.align(4)?;
        Ok(Self { num_items, data, bit_size })
    }

    pub fn unpack_ints(&self) -> Result<Vec<i32>> {
        let count = self.num_items as usize;
        let bits = self.bit_size as u32;
        if bits == 0 {
            return Ok(vec![0; count]);
        }
        let mut reader = BitReader::new(&self.data);
        (0..count)
            .map(|_| reader.read(bits).map(|x| x as i32).ok_or_else(|| truncated("PackedIntVector")))
            .collect()
    }
}

impl FromTree for PackedIntVector {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            num_items: v.u32_of("m_NumItems")?,
            data: v.bytes_of("m_Data")?,
            bit_size: v.u32_of("m_BitSize")? as u8,
        })
    }
}

/// Quaternions stored as a 3-bit flag plus three quantized components.
///
/// The low two flag bits name the dropped component, rebuilt from the unit
/// length constraint; the third flag bit negates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedQuatVector {
    pub num_items: u32,
    pub data: Vec<u8>,
}

impl PackedQuatVector {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let num_items = r.read_u32()?;
        let data = r.read_byte_array()?.to_vec();
        r.align(4)?;
        Ok(Self { num_items, data })
    }

    pub fn unpack_quats(&self) -> Result<Vec<Quat>> {
        let mut reader = BitReader::new(&self.data);
        let mut out = Vec::with_capacity(self.num_items as usize);
        for _ in 0..self.num_items {
            let flags = reader.read(3).ok_or_else(|| truncated("PackedQuatVector"))?;
            let missing = (flags & 3) as usize;
            let mut q = [0f32; 4];
            let mut sum = 0f32;
            for (j, slot) in q.iter_mut().enumerate() {
                if j == missing {
                    continue;
                }
                let bits = if (missing + 1) % 4 == j { 9 } else { 10 };
                let x = reader.read(bits).ok_or_else(|| truncated("PackedQuatVector"))?;
                *slot = x as f32 / (0.5 * max_value(bits)) - 1.0;
                sum += *slot * *slot;
            }
            let last = (1.0 - sum).max(0.0).sqrt();
            q[missing] = if flags & 4 != 0 { -last } else { last };
            out.push(Quat::from_array(q));
        }
        Ok(out)
    }
}

impl FromTree for PackedQuatVector {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            num_items: v.u32_of("m_NumItems")?,
            data: v.bytes_of("m_Data")?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bitpack::{pack_bits, BitWriter};

    /// Quantize `values` the way the engine's packer does.
    pub(crate) fn pack_floats(values: &[f32], bit_size: u8, start: f32, range: f32) -> PackedFloatVector {
        let max = max_value(bit_size as u32);
        let raw: Vec<u32> = values.iter().map(|v| (((v - start) / range) * max).round() as u32).collect();
        PackedFloatVector {
            num_items: values.len() as u32,
            range,
            start,
            data: pack_bits(&raw, bit_size as u32),
            bit_size,
        }
    }

    pub(crate) fn pack_ints(values: &[u32], bit_size: u8) -> PackedIntVector {
        PackedIntVector { num_items: values.len() as u32, data: pack_bits(values, bit_size as u32), bit_size }
    }

    pub(crate) fn pack_quats(quats: &[Quat]) -> PackedQuatVector {
        let mut w = BitWriter::new();
        for q in quats {
            let arr = q.to_array();
            let missing = (0..4).max_by(|&a, &b| arr[a].abs().total_cmp(&arr[b].abs())).unwrap_or(0);
            let negative = arr[missing] < 0.0;
            w.write(missing as u32 | if negative { 4 } else { 0 }, 3);
            for (j, c) in arr.iter().enumerate() {
                if j == missing {
                    continue;
                }
                let bits = if (missing + 1) % 4 == j { 9 } else { 10 };
                let x = ((c + 1.0) * 0.5 * max_value(bits)).round() as u32;
                w.write(x, bits);
            }
        }
        PackedQuatVector { num_items: quats.len() as u32, data: w.finish() }
    }

    #[test]
    fn test_float_roundtrip_within_quantum() {
        let values: Vec<f32> = (0..50).map(|i| -2.0 + i as f32 * 0.08).collect();
        for bits in [6u8, 11, 16, 24] {
            let packed = pack_floats(&values, bits, -2.0, 4.0);
            let out = packed.unpack_all().unwrap();
            let quantum = 4.0 / max_value(bits as u32);
            assert_eq!(out.len(), values.len());
            for (a, b) in out.iter().zip(&values) {
                assert!((a - b).abs() <= quantum, "bits={bits} {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_float_chunks_and_offset() {
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let packed = pack_floats(&values, 8, 0.0, 11.0);
        let all = packed.unpack_floats(3, 0, None).unwrap();
        assert_eq!(all.len(), 12);
        let tail = packed.unpack_floats(2, 6, Some(2)).unwrap();
        assert_eq!(tail.len(), 4);
        assert_abs_diff_eq!(tail[0], 6.0, epsilon = 0.05);
        assert_abs_diff_eq!(tail[3], 9.0, epsilon = 0.05);
    }

    #[test]
    fn test_zero_width_yields_start() {
        let packed = PackedFloatVector { num_items: 4, range: 0.0, start: 1.5, data: vec![], bit_size: 0 };
        assert_eq!(packed.unpack_all().unwrap(), [1.5; 4]);
    }

    #[test]
    fn test_truncated_data_errors() {
        let packed = PackedFloatVector { num_items: 4, range: 1.0, start: 0.0, data: vec![0xFF], bit_size: 8 };
        assert!(packed.unpack_all().is_err());
        let ints = PackedIntVector { num_items: 3, data: vec![0xFF], bit_size: 4 };
        assert!(ints.unpack_ints().is_err());
    }

    #[test]
    fn test_int_roundtrip_all_widths() {
        for width in 1..=32u32 {
            let max = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            let values: Vec<u32> = (0..37u32).map(|i| i.wrapping_mul(2654435761) & max).collect();
            let packed = pack_ints(&values, width as u8);
            let out: Vec<u32> = packed.unpack_ints().unwrap().into_iter().map(|x| x as u32).collect();
            assert_eq!(out, values, "width {width}");
        }
    }

    #[test]
    fn test_quats_unit_length() {
        let quats = [
            Quat::IDENTITY,
            Quat::from_rotation_y(1.2),
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -2.1, 0.9),
            Quat::from_xyzw(-0.5, 0.5, -0.5, 0.5),
            Quat::from_rotation_z(-3.0),
        ];
        let out = pack_quats(&quats).unpack_quats().unwrap();
        assert_eq!(out.len(), quats.len());
        for (a, b) in out.iter().zip(&quats) {
            assert_abs_diff_eq!(a.length_squared(), 1.0, epsilon = 1e-2);
            // same rotation up to quantization
            assert!(a.dot(*b).abs() > 0.995, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_quat_flag_layout() {
        // flags=3 (w dropped, positive): x uses 9 bits at slot (3+1)%4 = 0
        let mut w = BitWriter::new();
        w.write(3, 3);
        w.write(255, 9);
        w.write(511, 10);
        w.write(511, 10);
        let q = PackedQuatVector { num_items: 1, data: w.finish() }.unpack_quats().unwrap()[0];
        assert_abs_diff_eq!(q.x, 255.0 / 255.5 - 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(q.y, 511.0 / 511.5 - 1.0, epsilon = 1e-6);
        assert!(q.w > 0.99);
    }
}
