//! Scene hierarchy objects: GameObject, Transform and MeshFilter.

use serde::Serialize;

use super::base::{read_component, read_editor_extension};
use super::layout::{FromTree, TreeFields};
use super::mesh::Mesh;
use crate::serialized::{ObjectReader, PPtr};
use crate::tree::Value;
use crate::util::{ver, Quat, Result, Vec3};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameObject {
    pub name: String,
    pub components: Vec<PPtr>,
    pub layer: i32,
}

impl GameObject {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        read_editor_extension(r)?;
        // Before 5.5 every entry is prefixed by the component's class id.
        let with_class = r.version().below(ver(5, 5));
        let components = r.read_objects(12, |r| {
            if with_class {
                r.read_i32()?;
            }
            r.read_pptr()
        })?;
        let layer = r.read_i32()?;
        let name = r.read_aligned_string()?;
        Ok(Self { name, components, layer })
    }
}

/// Component pointer out of either element shape of `m_Component`.
fn component_entry(v: &Value) -> Result<PPtr> {
    match v.get("component").or_else(|| v.get("second")) {
        Some(p) => p.as_pptr(),
        None => v.as_pptr(),
    }
}

impl FromTree for GameObject {
    fn from_tree(v: &Value) -> Result<Self> {
        let components = match v.field("m_Component")? {
            Value::Map(pairs) => pairs.iter().map(|(_, p)| p.as_pptr()).collect::<Result<_>>()?,
            other => other.as_array()?.iter().map(component_entry).collect::<Result<_>>()?,
        };
        Ok(Self { name: v.string_of("m_Name")?, components, layer: v.i32_of("m_Layer")? })
    }
}

/// Transform, also used for RectTransform whose extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transform {
    pub game_object: PPtr<GameObject>,
    #[serde(skip)]
    pub local_rotation: Quat,
    #[serde(skip)]
    pub local_position: Vec3,
    #[serde(skip)]
    pub local_scale: Vec3,
    pub children: Vec<PPtr<Transform>>,
    pub father: PPtr<Transform>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            game_object: PPtr::null(),
            local_rotation: Quat::IDENTITY,
            local_position: Vec3::ZERO,
            local_scale: Vec3::ONE,
            children: Vec::new(),
            father: PPtr::null(),
        }
    }
}

impl Transform {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            game_object: read_component(r)?,
            local_rotation: r.read_quat()?,
            local_position: r.read_vec3()?,
            local_scale: r.read_vec3()?,
            children: r.read_pptr_array()?,
            father: r.read_pptr()?,
        })
    }
}

impl FromTree for Transform {
    fn from_tree(v: &Value) -> Result<Self> {
        let children = v.field("m_Children")?.as_array()?.iter().map(Value::as_pptr).collect::<Result<_>>()?;
        Ok(Self {
            game_object: v.field("m_GameObject")?.as_pptr()?,
            local_rotation: v.parse("m_LocalRotation")?,
            local_position: v.parse("m_LocalPosition")?,
            local_scale: v.parse("m_LocalScale")?,
            children,
            father: v.field("m_Father")?.as_pptr()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshFilter {
    pub game_object: PPtr<GameObject>,
    pub mesh: PPtr<Mesh>,
}

impl MeshFilter {
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self { game_object: read_component(r)?, mesh: r.read_pptr()? })
    }
}

impl FromTree for MeshFilter {
    fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self { game_object: v.field("m_GameObject")?.as_pptr()?, mesh: v.field("m_Mesh")?.as_pptr()? })
    }
}
