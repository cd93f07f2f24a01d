//! Engine class ids.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::util::{Error, Result};

/// Persistent engine class id (`classID` in the type table).
///
/// Open set: ids without a named constant still round-trip and print as
/// `Class<id>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClassId(pub i32);

macro_rules! class_ids {
    ($($name:ident = $id:literal),* $(,)?) => {
        impl ClassId {
            $(#[allow(non_upper_case_globals)]
            pub const $name: ClassId = ClassId($id);)*

            /// Engine type name, if known.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($id => Some(stringify!($name)),)*
                    _ => None,
                }
            }

            fn from_name(name: &str) -> Option<ClassId> {
                match name {
                    $(n if n.eq_ignore_ascii_case(stringify!($name)) => Some(ClassId($id)),)*
                    _ => None,
                }
            }
        }
    };
}

class_ids! {
    GameObject = 1,
    Component = 2,
    Transform = 4,
    Material = 21,
    MeshRenderer = 23,
    Texture2D = 28,
    MeshFilter = 33,
    Mesh = 43,
    Shader = 48,
    TextAsset = 49,
    AnimationClip = 74,
    AudioClip = 83,
    Avatar = 90,
    AnimatorController = 91,
    Animator = 95,
    Animation = 111,
    MonoBehaviour = 114,
    MonoScript = 115,
    Font = 128,
    SkinnedMeshRenderer = 137,
    AssetBundle = 142,
    ResourceManager = 147,
    PreloadData = 150,
    VideoClip = 329,
    Sprite = 213,
    AnimatorOverrideController = 221,
    RectTransform = 224,
    SpriteAtlas = 687078895,
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Class{}", self.0),
        }
    }
}

/// Accepts a known type name (case-insensitive) or a numeric id.
impl FromStr for ClassId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i32>() {
            return Ok(ClassId(id));
        }
        ClassId::from_name(s).ok_or_else(|| Error::other(format!("unknown class name '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(ClassId::Mesh.to_string(), "Mesh");
        assert_eq!(ClassId(9999).to_string(), "Class9999");
        assert_eq!("spriteatlas".parse::<ClassId>().unwrap(), ClassId::SpriteAtlas);
        assert_eq!("43".parse::<ClassId>().unwrap(), ClassId::Mesh);
        assert!("NotAClass".parse::<ClassId>().is_err());
    }
}
