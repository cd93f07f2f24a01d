//! Texture2D decoder.
//!
//! Only the header fields and the location of the pixel payload are
//! decoded; the payload itself is fetched on demand, see
//! `LoadSession::texture_image`.

use serde::Serialize;

use super::base::{read_named, StreamingInfo};
use super::layout::{run_steps, FieldStep, FromTree, TreeFields};
use crate::serialized::ObjectReader;
use crate::tree::Value;
use crate::util::{ver, ver1, Result, VersionGate};

/// Where the pixel payload lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum ImageData {
    #[default]
    None,
    /// Inside the object payload, `offset` bytes from its start.
    Inline { offset: usize, size: usize },
    /// Captured by the schema reader.
    Owned(Vec<u8>),
    /// In a resource stream.
    Streamed(StreamingInfo),
}

impl ImageData {
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Inline { size, .. } => *size,
            Self::Owned(bytes) => bytes.len(),
            Self::Streamed(info) => info.size as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GlTextureSettings {
    pub filter_mode: i32,
    pub aniso: i32,
    pub mip_bias: f32,
    /// Single wrap mode before 2017.1.
    pub wrap_u: i32,
    pub wrap_v: i32,
    pub wrap_w: i32,
}

impl GlTextureSettings {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut s = GlTextureSettings { filter_mode: r.read_i32()?, aniso: r.read_i32()?, mip_bias: r.read_f32()?, ..Default::default() };
        if r.version().at_least(ver1(2017)) {
            s.wrap_u = r.read_i32()?;
            s.wrap_v = r.read_i32()?;
            s.wrap_w = r.read_i32()?;
        } else {
            s.wrap_u = r.read_i32()?;
        }
        Ok(s)
    }
}

impl FromTree for GlTextureSettings {
    fn from_tree(v: &Value) -> Result<Self> {
        let wrap_u = match v.get("m_WrapU") {
            Some(w) => w.as_i32()?,
            None => v.i32_of("m_WrapMode")?,
        };
        Ok(Self {
            filter_mode: v.i32_of("m_FilterMode")?,
            aniso: v.i32_of("m_Aniso")?,
            mip_bias: v.f32_of("m_MipBias")?,
            wrap_u,
            wrap_v: v.parse_opt("m_WrapV")?.unwrap_or_default(),
            wrap_w: v.parse_opt("m_WrapW")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Texture2D {
    pub name: String,
    pub forced_fallback_format: i32,
    pub downscale_fallback: bool,
    pub is_alpha_channel_optional: bool,
    pub width: i32,
    pub height: i32,
    pub complete_image_size: u32,
    pub mips_stripped: i32,
    pub texture_format: i32,
    pub mip_count: i32,
    pub is_readable: bool,
    pub is_pre_processed: bool,
    pub ignore_master_texture_limit: bool,
    pub read_allowed: bool,
    pub streaming_mipmaps: bool,
    pub streaming_mipmaps_priority: i32,
    pub image_count: i32,
    pub texture_dimension: i32,
    pub texture_settings: GlTextureSettings,
    pub lightmap_format: i32,
    pub color_space: i32,
    #[serde(skip)]
    pub platform_blob: Vec<u8>,
    #[serde(skip)]
    pub image_data: ImageData,
}

pub(crate) const TEXTURE_LAYOUT: &[FieldStep<Texture2D>] = &[
    FieldStep::new("m_ForcedFallbackFormat", VersionGate::Since(ver(2017, 3)), |r, t| {
        t.forced_fallback_format = r.read_i32()?;
        t.downscale_fallback = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_IsAlphaChannelOptional", VersionGate::Since(ver(2020, 2)), |r, t| {
        t.is_alpha_channel_optional = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("align (Texture)", VersionGate::Since(ver(2017, 3)), |r, _| r.align(4)),
    FieldStep::new("m_Width", VersionGate::Always, |r, t| {
        t.width = r.read_i32()?;
        t.height = r.read_i32()?;
        t.complete_image_size = r.read_u32()?;
        Ok(())
    }),
    FieldStep::new("m_MipsStripped", VersionGate::Since(ver1(2020)), |r, t| {
        t.mips_stripped = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_TextureFormat", VersionGate::Always, |r, t| {
        t.texture_format = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_MipMap", VersionGate::Before(ver(5, 2)), |r, t| {
        t.mip_count = if r.read_bool()? { 2 } else { 1 };
        r.align(4)
    }),
    FieldStep::new("m_MipCount", VersionGate::Since(ver(5, 2)), |r, t| {
        t.mip_count = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_IsReadable", VersionGate::Since(ver(2, 6)), |r, t| {
        t.is_readable = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_IsPreProcessed", VersionGate::Since(ver1(2020)), |r, t| {
        t.is_pre_processed = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_IgnoreMasterTextureLimit", VersionGate::Since(ver(2019, 3)), |r, t| {
        t.ignore_master_texture_limit = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_ReadAllowed", VersionGate::Custom(|v| v.at_least(ver1(3)) && v.at_most(ver(5, 4))), |r, t| {
        t.read_allowed = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("m_StreamingMipmaps", VersionGate::Since(ver(2018, 2)), |r, t| {
        t.streaming_mipmaps = r.read_bool()?;
        Ok(())
    }),
    FieldStep::new("align", VersionGate::Always, |r, _| r.align(4)),
    FieldStep::new("m_StreamingMipmapsPriority", VersionGate::Since(ver(2018, 2)), |r, t| {
        t.streaming_mipmaps_priority = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_ImageCount", VersionGate::Always, |r, t| {
        t.image_count = r.read_i32()?;
        t.texture_dimension = r.read_i32()?;
        t.texture_settings = GlTextureSettings::read(r)?;
        Ok(())
    }),
    FieldStep::new("m_LightmapFormat", VersionGate::Since(ver1(3)), |r, t| {
        t.lightmap_format = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_ColorSpace", VersionGate::Since(ver(3, 5)), |r, t| {
        t.color_space = r.read_i32()?;
        Ok(())
    }),
    FieldStep::new("m_PlatformBlob", VersionGate::Since(ver(2020, 2)), |r, t| {
        t.platform_blob = r.read_byte_array()?.to_vec();
        r.align(4)
    }),
    FieldStep::new("image data", VersionGate::Always, |r, t| {
        let size = r.read_count(1)?;
        if size == 0 && r.version().at_least(ver(5, 3)) {
            t.image_data = ImageData::Streamed(StreamingInfo::read(r)?);
        } else {
            t.image_data = ImageData::Inline { offset: r.position(), size };
            r.skip(size)?;
        }
        Ok(())
    }),
];

impl Texture2D {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut texture = Texture2D { name: read_named(r)?, ..Default::default() };
        run_steps(TEXTURE_LAYOUT, r, &mut texture)?;
        Ok(texture)
    }
}

impl FromTree for Texture2D {
    fn from_tree(v: &Value) -> Result<Self> {
        let flag = |name: &str| -> Result<bool> { Ok(v.get(name).map(Value::as_bool).transpose()?.unwrap_or(false)) };
        let mip_count = match v.get("m_MipCount") {
            Some(c) => c.as_i32()?,
            None if flag("m_MipMap")? => 2,
            None => 1,
        };
        let stream = v.get("m_StreamData").map(StreamingInfo::from_tree).transpose()?;
        let image_data = match (v.get("image data"), stream) {
            (_, Some(info)) if !info.is_empty() => ImageData::Streamed(info),
            (Some(Value::Bytes(bytes)), _) => ImageData::Owned(bytes.clone()),
            (Some(&Value::Blob { offset, size }), _) => ImageData::Inline { offset: offset as usize, size: size as usize },
            _ => ImageData::None,
        };
        Ok(Self {
            name: v.string_of("m_Name")?,
            forced_fallback_format: v.parse_opt("m_ForcedFallbackFormat")?.unwrap_or_default(),
            downscale_fallback: flag("m_DownscaleFallback")?,
            is_alpha_channel_optional: flag("m_IsAlphaChannelOptional")?,
            width: v.i32_of("m_Width")?,
            height: v.i32_of("m_Height")?,
            complete_image_size: v.u32_of("m_CompleteImageSize")?,
            mips_stripped: v.parse_opt("m_MipsStripped")?.unwrap_or_default(),
            texture_format: v.i32_of("m_TextureFormat")?,
            mip_count,
            is_readable: flag("m_IsReadable")?,
            is_pre_processed: flag("m_IsPreProcessed")?,
            ignore_master_texture_limit: flag("m_IgnoreMasterTextureLimit")?,
            read_allowed: flag("m_ReadAllowed")?,
            streaming_mipmaps: flag("m_StreamingMipmaps")?,
            streaming_mipmaps_priority: v.parse_opt("m_StreamingMipmapsPriority")?.unwrap_or_default(),
            image_count: v.i32_of("m_ImageCount")?,
            texture_dimension: v.i32_of("m_TextureDimension")?,
            texture_settings: v.parse("m_TextureSettings")?,
            lightmap_format: v.parse_opt("m_LightmapFormat")?.unwrap_or_default(),
            color_space: v.parse_opt("m_ColorSpace")?.unwrap_or_default(),
            platform_blob: if v.get("m_PlatformBlob").is_some() { v.bytes_of("m_PlatformBlob")? } else { Vec::new() },
            image_data,
        })
    }
}
