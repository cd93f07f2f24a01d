//! Explicit per-channel vertex layouts (`VertexData`).

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use half::f16;

use super::BoneWeights4;
use crate::serialized::ObjectReader;
use crate::stream::Endian;
use crate::util::{ver, ver1, Error, Result, UnityVersion};

/// Component encoding of a vertex channel, normalized to the 2019+ table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float,
    Float16,
    UNorm8,
    SNorm8,
    UNorm16,
    SNorm16,
    UInt8,
    SInt8,
    UInt16,
    SInt16,
    UInt32,
    SInt32,
}

impl VertexFormat {
    const MODERN: [VertexFormat; 12] = [
        Self::Float,
        Self::Float16,
        Self::UNorm8,
        Self::SNorm8,
        Self::UNorm16,
        Self::SNorm16,
        Self::UInt8,
        Self::SInt8,
        Self::UInt16,
        Self::SInt16,
        Self::UInt32,
        Self::SInt32,
    ];

    /// Map a stored channel format through the table in use for `version`.
    pub fn from_raw(format: u8, version: &UnityVersion) -> Result<Self> {
        let unknown = || Error::invalid(format!("unknown vertex format {format} for {version}"));
        if version.below(ver1(2017)) {
            // Float, Float16, Color, Byte, UInt32
            return match format {
                0 => Ok(Self::Float),
                1 => Ok(Self::Float16),
                2 => Ok(Self::UNorm8),
                3 => Ok(Self::UInt8),
                4 => Ok(Self::UInt32),
                _ => Err(unknown()),
            };
        }
        if version.below(ver1(2019)) {
            // 2017 table: Color sits at 2, everything after shifts by one
            return match format {
                0 => Ok(Self::Float),
                1 => Ok(Self::Float16),
                2 => Ok(Self::UNorm8),
                3..=12 => Ok(Self::MODERN[format as usize - 1]),
                _ => Err(unknown()),
            };
        }
        Self::MODERN.get(format as usize).copied().ok_or_else(unknown)
    }

    /// Bytes per component.
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::UInt32 | Self::SInt32 => 4,
            Self::Float16 | Self::UNorm16 | Self::SNorm16 | Self::UInt16 | Self::SInt16 => 2,
            Self::UNorm8 | Self::SNorm8 | Self::UInt8 | Self::SInt8 => 1,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Self::UInt8 | Self::SInt8 | Self::UInt16 | Self::SInt16 | Self::UInt32 | Self::SInt32)
    }

    fn float_at(self, b: &[u8], endian: Endian) -> f32 {
        let u16_at = |b: &[u8]| match endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        };
        match self {
            Self::Float => f32::from_bits(match endian {
                Endian::Little => LittleEndian::read_u32(b),
                Endian::Big => BigEndian::read_u32(b),
            }),
            Self::Float16 => f16::from_bits(u16_at(b)).to_f32(),
            Self::UNorm8 => b[0] as f32 / 255.0,
            Self::SNorm8 => (b[0] as i8 as f32 / 127.0).max(-1.0),
            Self::UNorm16 => u16_at(b) as f32 / 65535.0,
            Self::SNorm16 => (u16_at(b) as i16 as f32 / 32767.0).max(-1.0),
            _ => self.int_at(b, endian) as f32,
        }
    }

    fn int_at(self, b: &[u8], endian: Endian) -> i32 {
        let u16_at = |b: &[u8]| match endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        };
        let u32_at = |b: &[u8]| match endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        };
        match self {
            Self::UInt8 | Self::UNorm8 => b[0] as i32,
            Self::SInt8 | Self::SNorm8 => b[0] as i8 as i32,
            Self::UInt16 | Self::UNorm16 => u16_at(b) as i32,
            Self::SInt16 | Self::SNorm16 => u16_at(b) as i16 as i32,
            Self::UInt32 | Self::SInt32 => u32_at(b) as i32,
            Self::Float => f32::from_bits(u32_at(b)) as i32,
            Self::Float16 => f16::from_bits(u16_at(b)).to_f32() as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    pub stream: u8,
    pub offset: u8,
    pub format: u8,
    /// Component count; the high nibble carries flags and is dropped.
    pub dimension: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub channel_mask: u32,
    pub offset: u32,
    pub stride: u32,
    pub divider_op: u8,
    pub frequency: u16,
}

impl StreamInfo {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let channel_mask = r.read_u32()?;
        let offset = r.read_u32()?;
        if r.version().below(ver1(4)) {
            let stride = r.read_u32()?;
            let _align = r.read_u32()?;
            return Ok(Self { channel_mask, offset, stride, ..Default::default() });
        }
        Ok(Self {
            channel_mask,
            offset,
            stride: r.read_u8()? as u32,
            divider_op: r.read_u8()?,
            frequency: r.read_u16()?,
        })
    }
}

/// Where each vertex attribute lands after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    Normal,
    Tangent,
    Color,
    Uv(usize),
    BlendWeight,
    BlendIndices,
}

impl VertexAttribute {
    /// Channel index to attribute. 2018 reordered the channels and widened
    /// the UV set to eight.
    pub fn for_channel(channel: usize, version: &UnityVersion) -> Option<Self> {
        if version.at_least(ver1(2018)) {
            return match channel {
                0 => Some(Self::Position),
                1 => Some(Self::Normal),
                2 => Some(Self::Tangent),
                3 => Some(Self::Color),
                4..=11 => Some(Self::Uv(channel - 4)),
                12 => Some(Self::BlendWeight),
                13 => Some(Self::BlendIndices),
                _ => None,
            };
        }
        match channel {
            0 => Some(Self::Position),
            1 => Some(Self::Normal),
            2 => Some(Self::Color),
            3 => Some(Self::Uv(0)),
            4 => Some(Self::Uv(1)),
            5 if version.at_least(ver1(5)) => Some(Self::Uv(2)),
            5 => Some(Self::Tangent),
            6 => Some(Self::Uv(3)),
            7 => Some(Self::Tangent),
            _ => None,
        }
    }
}

/// One extracted channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl ChannelValues {
    pub fn into_floats(self) -> Vec<f32> {
        match self {
            Self::Float(v) => v,
            Self::Int(v) => v.into_iter().map(|x| x as f32).collect(),
        }
    }

    pub fn into_ints(self) -> Vec<i32> {
        match self {
            Self::Int(v) => v,
            Self::Float(v) => v.into_iter().map(|x| x as i32).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VertexData {
    pub current_channels: u32,
    pub vertex_count: u32,
    pub channels: Vec<ChannelInfo>,
    pub streams: Vec<StreamInfo>,
    pub data: Vec<u8>,
}

impl VertexData {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut vd = VertexData::default();
        if version.below(ver1(2018)) {
            vd.current_channels = r.read_u32()?;
        }
        vd.vertex_count = r.read_u32()?;

        if version.at_least(ver1(4)) {
            vd.channels = r.read_array(4, |r| {
                Ok(ChannelInfo {
                    stream: r.read_u8()?,
                    offset: r.read_u8()?,
                    format: r.read_u8()?,
                    dimension: r.read_u8()? & 0xF,
                })
            })?;
        }

        if version.below(ver1(5)) {
            let count = if version.below(ver1(4)) { 4 } else { r.read_count(12)? };
            vd.streams = Vec::with_capacity(count);
            for _ in 0..count {
                vd.streams.push(StreamInfo::read(r)?);
            }
            if version.below(ver1(4)) {
                vd.channels_from_streams(version)?;
            }
        } else {
            vd.streams_from_channels(version)?;
        }

        vd.data = r.read_byte_array()?.to_vec();
        r.align(4)?;
        Ok(vd)
    }

    /// Rebuild the fixed six-channel table implied by pre-4.0 stream masks.
    fn channels_from_streams(&mut self, version: &UnityVersion) -> Result<()> {
        self.channels = vec![ChannelInfo::default(); 6];
        for (s, stream) in self.streams.iter().enumerate() {
            let mut offset = 0u8;
            for (i, channel) in self.channels.iter_mut().enumerate() {
                if stream.channel_mask & (1 << i) == 0 {
                    continue;
                }
                let (format, dimension) = match i {
                    0 | 1 => (0, 3),
                    2 => (2, 4),
                    3 | 4 => (0, 2),
                    _ => (0, 4),
                };
                *channel = ChannelInfo { stream: s as u8, offset, format, dimension };
                let size = VertexFormat::from_raw(format, version)?.size();
                offset = offset.wrapping_add(dimension * size as u8);
            }
        }
        Ok(())
    }

    /// Derive tightly packed streams from the channel table (5.0+, where
    /// streams are no longer serialized). Streams start on 16-byte boundaries.
    fn streams_from_channels(&mut self, version: &UnityVersion) -> Result<()> {
        let stream_count = self.channels.iter().map(|c| c.stream as usize + 1).max().unwrap_or(0);
        self.streams = Vec::with_capacity(stream_count);
        let mut offset = 0u32;
        for s in 0..stream_count {
            let mut channel_mask = 0u32;
            let mut stride = 0u32;
            for (i, channel) in self.channels.iter().enumerate() {
                if channel.stream as usize == s && channel.dimension > 0 {
                    channel_mask |= 1 << i;
                    stride += channel.dimension as u32 * VertexFormat::from_raw(channel.format, version)?.size() as u32;
                }
            }
            self.streams.push(StreamInfo { channel_mask, offset, stride, ..Default::default() });
            offset += self.vertex_count * stride;
            offset = (offset + 15) & !15;
        }
        Ok(())
    }

    /// Extract every enabled channel, tagged with its attribute.
    pub fn extract(&self, version: &UnityVersion, endian: Endian) -> Result<Vec<(VertexAttribute, usize, ChannelValues)>> {
        let count = self.vertex_count as usize;
        let mut out = Vec::new();
        for (chn, channel) in self.channels.iter().enumerate() {
            if channel.dimension == 0 {
                continue;
            }
            let stream = self
                .streams
                .get(channel.stream as usize)
                .ok_or_else(|| Error::invalid(format!("channel {chn} names missing stream {}", channel.stream)))?;
            if stream.channel_mask & (1 << chn) == 0 {
                continue;
            }
            let mut dimension = channel.dimension as usize;
            if version.below(ver1(2018)) && chn == 2 && channel.format == 2 {
                // legacy color channel is always RGBA bytes
                dimension = 4;
            }
            let format = VertexFormat::from_raw(channel.format, version)?;
            let size = format.size();

            let mut floats = Vec::new();
            let mut ints = Vec::new();
            for v in 0..count {
                let base = stream.offset as usize + channel.offset as usize + stream.stride as usize * v;
                for d in 0..dimension {
                    let at = base + size * d;
                    let bytes = self
                        .data
                        .get(at..at + size)
                        .ok_or_else(|| Error::invalid(format!("vertex channel {chn} runs past the vertex data")))?;
                    if format.is_int() {
                        ints.push(format.int_at(bytes, endian));
                    } else {
                        floats.push(format.float_at(bytes, endian));
                    }
                }
            }
            let values = if format.is_int() { ChannelValues::Int(ints) } else { ChannelValues::Float(floats) };
            if let Some(attribute) = VertexAttribute::for_channel(chn, version) {
                out.push((attribute, dimension, values));
            }
        }
        Ok(out)
    }
}

/// Write a blend-weight or blend-index channel into per-vertex skin slots.
pub(crate) fn fill_skin(skin: &mut Vec<BoneWeights4>, count: usize, dimension: usize, values: ChannelValues, weights: bool) {
    if skin.len() < count {
        skin.resize(count, BoneWeights4::default());
    }
    let dim = dimension.min(4);
    if weights {
        let v = values.into_floats();
        for (i, slot) in skin.iter_mut().enumerate().take(count) {
            for j in 0..dim {
                slot.weight[j] = v.get(i * dimension + j).copied().unwrap_or_default();
            }
        }
    } else {
        let v = values.into_ints();
        for (i, slot) in skin.iter_mut().enumerate().take(count) {
            for j in 0..dim {
                slot.bone_index[j] = v.get(i * dimension + j).copied().unwrap_or_default();
            }
        }
    }
}

/// Index format flag first appears mid-2017.3, depending on patch level and
/// mesh compression.
pub(crate) fn has_index_format(version: &UnityVersion, mesh_compression: u8) -> bool {
    version.at_least(ver(2017, 4))
        || (version.major == 2017 && version.minor == 3 && version.patch == 1 && version.is_patch())
        || (version.is(ver(2017, 3)) && mesh_compression == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> UnityVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_format_tables() {
        assert_eq!(VertexFormat::from_raw(2, &v("5.6.0f1")).unwrap(), VertexFormat::UNorm8);
        assert_eq!(VertexFormat::from_raw(3, &v("5.6.0f1")).unwrap(), VertexFormat::UInt8);
        assert!(VertexFormat::from_raw(5, &v("5.6.0f1")).is_err());
        assert_eq!(VertexFormat::from_raw(3, &v("2018.4.0f1")).unwrap(), VertexFormat::UNorm8);
        assert_eq!(VertexFormat::from_raw(10, &v("2018.4.0f1")).unwrap(), VertexFormat::SInt16);
        assert_eq!(VertexFormat::from_raw(2, &v("2019.4.0f1")).unwrap(), VertexFormat::UNorm8);
        assert_eq!(VertexFormat::from_raw(11, &v("2020.1.0f1")).unwrap(), VertexFormat::SInt32);
        assert_eq!(VertexFormat::SNorm16.size(), 2);
        assert!(VertexFormat::UInt8.is_int());
        assert!(!VertexFormat::UNorm16.is_int());
    }

    #[test]
    fn test_channel_mapping() {
        let old = v("4.7.2f1");
        let five = v("5.6.0f1");
        let new = v("2019.4.0f1");
        assert_eq!(VertexAttribute::for_channel(5, &old), Some(VertexAttribute::Tangent));
        assert_eq!(VertexAttribute::for_channel(5, &five), Some(VertexAttribute::Uv(2)));
        assert_eq!(VertexAttribute::for_channel(7, &five), Some(VertexAttribute::Tangent));
        assert_eq!(VertexAttribute::for_channel(2, &new), Some(VertexAttribute::Tangent));
        assert_eq!(VertexAttribute::for_channel(11, &new), Some(VertexAttribute::Uv(7)));
        assert_eq!(VertexAttribute::for_channel(13, &new), Some(VertexAttribute::BlendIndices));
        assert_eq!(VertexAttribute::for_channel(14, &new), None);
    }

    #[test]
    fn test_streams_are_16_aligned() {
        let version = v("2019.4.0f1");
        let mut vd = VertexData {
            vertex_count: 3,
            channels: vec![
                ChannelInfo { stream: 0, offset: 0, format: 0, dimension: 3 },
                ChannelInfo { stream: 1, offset: 0, format: 1, dimension: 2 },
            ],
            ..Default::default()
        };
        vd.streams_from_channels(&version).unwrap();
        assert_eq!(vd.streams.len(), 2);
        assert_eq!(vd.streams[0].stride, 12);
        assert_eq!(vd.streams[0].channel_mask, 0b01);
        // 3 * 12 = 36 -> 48
        assert_eq!(vd.streams[1].offset, 48);
        assert_eq!(vd.streams[1].stride, 4);
        assert_eq!(vd.streams[1].channel_mask, 0b10);
    }

    #[test]
    fn test_extract_interleaved_big_endian() {
        let version = v("2019.4.0f1");
        let mut data = Vec::new();
        for i in 0..2u16 {
            for c in [1.0f32 + i as f32, 2.0, 3.0] {
                data.extend_from_slice(&c.to_be_bytes());
            }
            data.extend_from_slice(&(0x3C00u16).to_be_bytes()); // 1.0 as f16
            data.extend_from_slice(&(i * 100).to_be_bytes());
        }
        let vd = VertexData {
            vertex_count: 2,
            channels: vec![
                ChannelInfo { stream: 0, offset: 0, format: 0, dimension: 3 },
                ChannelInfo { stream: 0, offset: 12, format: 1, dimension: 1 },
                ChannelInfo::default(),
                ChannelInfo::default(),
                ChannelInfo { stream: 0, offset: 14, format: 4, dimension: 1 },
            ],
            streams: vec![StreamInfo { channel_mask: 0b10011, offset: 0, stride: 16, ..Default::default() }],
            data,
            ..Default::default()
        };
        let out = vd.extract(&version, Endian::Big).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], (VertexAttribute::Position, 3, ChannelValues::Float(vec![1.0, 2.0, 3.0, 2.0, 2.0, 3.0])));
        assert_eq!(out[1], (VertexAttribute::Normal, 1, ChannelValues::Float(vec![1.0, 1.0])));
        let ChannelValues::Float(uv) = &out[2].2 else { panic!("unorm16 is a float format") };
        assert_eq!(out[2].0, VertexAttribute::Uv(0));
        assert!((uv[1] - 100.0 / 65535.0).abs() < 1e-7);
    }

    #[test]
    fn test_extract_rejects_short_data() {
        let vd = VertexData {
            vertex_count: 4,
            channels: vec![ChannelInfo { stream: 0, offset: 0, format: 0, dimension: 3 }],
            streams: vec![StreamInfo { channel_mask: 1, offset: 0, stride: 12, ..Default::default() }],
            data: vec![0; 24],
            ..Default::default()
        };
        assert!(vd.extract(&v("2019.4.0f1"), Endian::Little).is_err());
    }

    #[test]
    fn test_index_format_gate() {
        assert!(has_index_format(&v("2017.4.0f1"), 1));
        assert!(has_index_format(&v("2017.3.1p1"), 1));
        assert!(!has_index_format(&v("2017.3.1f1"), 1));
        assert!(has_index_format(&v("2017.3.0f3"), 0));
        assert!(!has_index_format(&v("2017.2.0f3"), 0));
    }
}
