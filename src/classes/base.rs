//! Base-class prefixes shared by every object layout.
//!
//! Editor builds serialize extra hide-flag and prefab fields in front of
//! every object; player builds start directly with the class fields.

use serde::Serialize;

use super::game_object::GameObject;
use super::layout::TreeFields;
use crate::serialized::{ObjectReader, PPtr};
use crate::tree::Value;
use crate::util::{ver1, Result};

/// Fields only present when the target platform is the editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorFields {
    pub hide_flags: u32,
    pub prefab_parent: PPtr,
    pub prefab_internal: PPtr,
}

/// `Object` prefix: hide flags in editor builds.
pub fn read_object(r: &mut ObjectReader<'_>) -> Result<Option<u32>> {
    if r.is_editor() {
        return Ok(Some(r.read_u32()?));
    }
    Ok(None)
}

/// `EditorExtension` prefix.
pub fn read_editor_extension(r: &mut ObjectReader<'_>) -> Result<Option<EditorFields>> {
    let Some(hide_flags) = read_object(r)? else {
        return Ok(None);
    };
    Ok(Some(EditorFields {
        hide_flags,
        prefab_parent: r.read_pptr()?,
        prefab_internal: r.read_pptr()?,
    }))
}

/// `NamedObject` prefix, returning `m_Name`.
pub fn read_named(r: &mut ObjectReader<'_>) -> Result<String> {
    read_editor_extension(r)?;
    r.read_aligned_string()
}

/// `Component` prefix, returning the owning GameObject.
pub fn read_component(r: &mut ObjectReader<'_>) -> Result<PPtr<GameObject>> {
    read_editor_extension(r)?;
    r.read_pptr()
}

/// Location of a payload kept outside the object, in a resource stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamingInfo {
    pub offset: u64,
    pub size: u32,
    pub path: String,
}

impl StreamingInfo {
    /// The offset widened to 64 bits in 2020.1.
    pub fn read(r: &mut ObjectReader<'_>) -> Result<Self> {
        let offset = if r.version().at_least(ver1(2020)) { r.read_u64()? } else { r.read_u32()? as u64 };
        Ok(Self {
            offset,
            size: r.read_u32()?,
            path: r.read_aligned_string()?,
        })
    }

    pub fn from_tree(v: &Value) -> Result<Self> {
        Ok(Self {
            offset: v.field("offset")?.as_u64()?,
            size: v.u32_of("size")?,
            path: v.string_of("path")?,
        })
    }

    /// True when the payload is inline (no resource path).
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Display name from a schema tree's `m_Name`, when present.
pub fn tree_name(tree: &Value) -> Option<String> {
    tree.get("m_Name").and_then(|v| v.as_str().ok()).map(str::to_owned)
}
