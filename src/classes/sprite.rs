//! Sprite and SpriteAtlas decoders.

use std::fmt;

use serde::Serialize;

use super::base::read_named;
use super::layout::{run_steps, FieldStep, FromTree, TreeFields};
use super::texture2d::Texture2D;
use crate::serialized::{ObjectReader, PPtr};
use crate::tree::Value;
use crate::util::{ver, ver1, ver3, Rect, Result, UnityVersion, Vec2, Vec4, VersionGate};

/// 128-bit asset GUID stored as four words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Guid(pub [u32; 4]);

impl Guid {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self([r.read_u32()?, r.read_u32()?, r.read_u32()?, r.read_u32()?]))
    }
}

impl FromTree for Guid {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self([v.u32_of("data[0]")?, v.u32_of("data[1]")?, v.u32_of("data[2]")?, v.u32_of("data[3]")?]))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in self.0 {
            write!(f, "{word:08x}")?;
        }
        Ok(())
    }
}

/// Key of a sprite's render data inside its atlas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RenderDataKey {
    pub guid: Guid,
    pub id: i64,
}

impl RenderDataKey {
    fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { guid: Guid::read(r)?, id: r.read_i64()? })
    }
}

impl FromTree for RenderDataKey {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { guid: v.parse("first")?, id: v.i64_of("second")? })
    }
}

fn read_rect(r: &mut ObjectReader<'_>) -> Result<Rect> {
    Ok(Rect { x: r.read_f32()?, y: r.read_f32()?, width: r.read_f32()?, height: r.read_f32()? })
}

/// Pivot was added in 5.4.2, and backported to 5.4.1p3.
fn has_pivot(v: &UnityVersion) -> bool {
    v.at_least(ver3(5, 4, 2)) || (v.is(ver3(5, 4, 1)) && v.is_patch() && v.build >= 3)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sprite {
    pub name: String,
    #[serde(skip)]
    pub rect: Rect,
    #[serde(skip)]
    pub offset: Vec2,
    #[serde(skip)]
    pub border: Vec4,
    pub pixels_to_units: f32,
    #[serde(skip)]
    pub pivot: Vec2,
    pub extrude: u32,
    pub is_polygon: bool,
    pub render_data_key: Option<RenderDataKey>,
    pub atlas_tags: Vec<String>,
    pub sprite_atlas: PPtr<SpriteAtlas>,
}

pub(crate) const SPRITE_LAYOUT: &[FieldStep<Sprite>] = &[
    FieldStep::new("m_Rect", VersionGate::Always, |r, s| {
        s.rect = read_rect(r)?;
        s.offset = r.read_vec2()?;
        Ok(())
    }),
    FieldStep::new("m_Border", VersionGate::Since(ver(4, 5)), |r, s| {
        s.border = r.read_vec4()?;
        Ok(())
    }),
    FieldStep::new("m_PixelsToUnits", VersionGate::Always, |r, s| {
        s.pixels_to_units = r.read_f32()?;
        Ok(())
    }),
    FieldStep::new("m_Pivot", VersionGate::Custom(has_pivot), |r, s| {
        s.pivot = r.read_vec2()?;
        Ok(())
    }),
    FieldStep::new("m_Extrude", VersionGate::Always, |r, s| {
        s.extrude = r.read_u32()?;
        Ok(())
    }),
    FieldStep::new("m_IsPolygon", VersionGate::Since(ver(5, 3)), |r, s| {
        s.is_polygon = r.read_bool()?;
        r.align(4)
    }),
    FieldStep::new("m_RenderDataKey", VersionGate::Since(ver1(2017)), |r, s| {
        s.render_data_key = Some(RenderDataKey::read(r)?);
        s.atlas_tags = r.read_string_array()?;
        s.sprite_atlas = r.read_pptr()?;
        Ok(())
    }),
];

impl Sprite {
    /// Decodes up to and including the atlas reference; the render data
    /// that follows is left unread.
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let mut sprite = Sprite { name: read_named(r)?, pivot: Vec2::splat(0.5), ..Default::default() };
        run_steps(SPRITE_LAYOUT, r, &mut sprite)?;
        Ok(sprite)
    }
}

impl FromTree for Sprite {
    fn from_tree(v: &Value) -> Result<Self> {
        let sprite_atlas = match v.get("m_SpriteAtlas") {
            Some(p) => p.as_pptr()?,
            None => PPtr::null(),
        };
        Ok(Self {
            name: v.string_of("m_Name")?,
            rect: v.parse("m_Rect")?,
            offset: v.parse("m_Offset")?,
            border: v.parse_opt("m_Border")?.unwrap_or_default(),
            pixels_to_units: v.f32_of("m_PixelsToUnits")?,
            pivot: v.parse_opt("m_Pivot")?.unwrap_or(Vec2::splat(0.5)),
            extrude: v.u32_of("m_Extrude")?,
            is_polygon: v.get("m_IsPolygon").map(Value::as_bool).transpose()?.unwrap_or(false),
            render_data_key: v.parse_opt("m_RenderDataKey")?,
            atlas_tags: v.parse_opt("m_AtlasTags")?.unwrap_or_default(),
            sprite_atlas,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecondaryTexture {
    pub texture: PPtr<Texture2D>,
    pub name: String,
}

impl FromTree for SecondaryTexture {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { texture: v.field("texture")?.as_pptr()?, name: v.string_of("name")? })
    }
}

/// Placement of one sprite inside an atlas texture.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpriteAtlasData {
    pub texture: PPtr<Texture2D>,
    pub alpha_texture: PPtr<Texture2D>,
    #[serde(skip)]
    pub texture_rect: Rect,
    #[serde(skip)]
    pub texture_rect_offset: Vec2,
    #[serde(skip)]
    pub atlas_rect_offset: Vec2,
    #[serde(skip)]
    pub uv_transform: Vec4,
    pub downscale_multiplier: f32,
    pub settings_raw: u32,
    pub secondary_textures: Vec<SecondaryTexture>,
}

impl SpriteAtlasData {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let version = r.version();
        let mut d = SpriteAtlasData {
            texture: r.read_pptr()?,
            alpha_texture: r.read_pptr()?,
            texture_rect: read_rect(r)?,
            texture_rect_offset: r.read_vec2()?,
            ..Default::default()
        };
        if version.at_least(ver(2017, 2)) {
            d.atlas_rect_offset = r.read_vec2()?;
        }
        d.uv_transform = r.read_vec4()?;
        d.downscale_multiplier = r.read_f32()?;
        d.settings_raw = r.read_u32()?;
        if version.at_least(ver(2020, 2)) {
            d.secondary_textures =
                r.read_objects(16, |r| Ok(SecondaryTexture { texture: r.read_pptr()?, name: r.read_aligned_string()? }))?;
            r.align(4)?;
        }
        Ok(d)
    }
}

impl FromTree for SpriteAtlasData {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            texture: v.field("texture")?.as_pptr()?,
            alpha_texture: v.field("alphaTexture")?.as_pptr()?,
            texture_rect: v.parse("textureRect")?,
            texture_rect_offset: v.parse("textureRectOffset")?,
            atlas_rect_offset: v.parse_opt("atlasRectOffset")?.unwrap_or_default(),
            uv_transform: v.parse("uvTransform")?,
            downscale_multiplier: v.f32_of("downscaleMultiplier")?,
            settings_raw: v.u32_of("settingsRaw")?,
            secondary_textures: v.parse_opt("secondaryTextures")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpriteAtlas {
    pub name: String,
    pub packed_sprites: Vec<PPtr<Sprite>>,
    pub packed_sprite_names_to_index: Vec<String>,
    pub render_data_map: Vec<(RenderDataKey, SpriteAtlasData)>,
    pub tag: String,
    pub is_variant: bool,
}

impl SpriteAtlas {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let name = read_named(r)?;
        let packed_sprites = r.read_pptr_array()?;
        let packed_sprite_names_to_index = r.read_string_array()?;
        let render_data_map = r.read_objects(72, |r| Ok((RenderDataKey::read(r)?, SpriteAtlasData::read(r)?)))?;
        let tag = r.read_aligned_string()?;
        let is_variant = r.read_bool()?;
        r.align(4)?;
        Ok(Self { name, packed_sprites, packed_sprite_names_to_index, render_data_map, tag, is_variant })
    }

    /// Atlas placement of the sprite with `key`.
    pub fn render_data(&self, key: &RenderDataKey) -> Option<&SpriteAtlasData> {
        self.render_data_map.iter().find(|(k, _)| k == key).map(|(_, d)| d)
    }
}

impl FromTree for SpriteAtlas {
    fn from_tree(v: &Value) -> Result<Self> {
        let packed_sprites = v.field("m_PackedSprites")?.as_array()?.iter().map(Value::as_pptr).collect::<Result<_>>()?;
        let render_data_map = match v.field("m_RenderDataMap")? {
            Value::Map(pairs) => pairs
                .iter()
                .map(|(k, d)| Ok((RenderDataKey::from_tree(k)?, SpriteAtlasData::from_tree(d)?)))
                .collect::<Result<_>>()?,
            other => other
                .as_array()?
                .iter()
                .map(|pair| Ok((pair.parse("first")?, pair.parse("second")?)))
                .collect::<Result<_>>()?,
        };
        Ok(Self {
            name: v.string_of("m_Name")?,
            packed_sprites,
            packed_sprite_names_to_index: v.array_of("m_PackedSpriteNamesToIndex")?,
            render_data_map,
            tag: v.string_of("m_Tag")?,
            is_variant: v.bool_of("m_IsVariant")?,
        })
    }
}
