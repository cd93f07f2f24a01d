//! Embedded per-type schemas (type trees).
//!
//! A type tree is a pre-order list of nodes; nesting is expressed only by
//! each node's `level`. Format 10 and 12+ store it as a fixed-size node
//! table plus a string buffer ("blob"); older formats store a recursive
//! node-with-children layout.

use crate::stream::EndianReader;
use crate::util::{Error, Result};

/// `meta_flag` bit: align the stream to 4 bytes after this node.
pub const FLAG_ALIGN: i32 = 0x4000;

/// `type_flags` bit: node is an array.
pub const TYPE_FLAG_ARRAY: i32 = 0x1;

/// High bit of a string offset: index into [`COMMON_STRINGS`] instead of the local buffer.
const COMMON_STRING_BIT: u32 = 0x8000_0000;

/// Built-in string table shared by every blob type tree.
pub const COMMON_STRINGS: &str = "AABB\0AnimationClip\0AnimationCurve\0AnimationState\0Array\0Base\0BitField\0bitset\0bool\0char\0\
ColorRGBA\0Component\0data\0deque\0double\0dynamic_array\0FastPropertyName\0first\0float\0Font\0GameObject\0Generic Mono\0\
GradientNEW\0GUID\0GUIStyle\0int\0list\0long long\0map\0Matrix4x4f\0MdFour\0MonoBehaviour\0MonoScript\0m_ByteSize\0m_Curve\0\
m_EditorClassIdentifier\0m_EditorHideFlags\0m_Enabled\0m_ExtensionPtr\0m_GameObject\0m_Index\0m_IsArray\0m_IsStatic\0\
m_MetaFlag\0m_Name\0m_ObjectHideFlags\0m_PrefabInternal\0m_PrefabParentObject\0m_Script\0m_StaticEditorFlags\0m_Type\0\
m_Version\0Object\0pair\0PPtr<Component>\0PPtr<GameObject>\0PPtr<Material>\0PPtr<MonoBehaviour>\0PPtr<MonoScript>\0\
PPtr<Object>\0PPtr<Prefab>\0PPtr<Sprite>\0PPtr<TextAsset>\0PPtr<Texture>\0PPtr<Texture2D>\0PPtr<Transform>\0Prefab\0\
Quaternionf\0Rectf\0RectInt\0RectOffset\0second\0set\0short\0size\0SInt16\0SInt32\0SInt64\0SInt8\0staticvector\0string\0\
TextAsset\0TextMesh\0Texture\0Texture2D\0Transform\0TypelessData\0UInt16\0UInt32\0UInt64\0UInt8\0unsigned int\0\
unsigned long long\0unsigned short\0vector\0Vector2f\0Vector3f\0Vector4f\0m_ScriptingClassIdentifier\0Gradient\0Type*\0\
int2_storage\0int3_storage\0BoundsInt\0m_CorrespondingSourceObject\0m_PrefabInstance\0m_PrefabAsset\0FileSize\0Hash128\0\
RenderingLayerMask\0";

/// Offset of `s` inside [`COMMON_STRINGS`], if it is one of the built-ins.
pub fn common_string_offset(s: &str) -> Option<u32> {
    let mut offset = 0usize;
    for entry in COMMON_STRINGS.split('\0') {
        if entry == s && !entry.is_empty() {
            return Some(offset as u32);
        }
        offset += entry.len() + 1;
    }
    None
}

fn string_at(buffer: &[u8], offset: usize) -> Option<String> {
    let rest = buffer.get(offset..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn resolve_string(local: &[u8], offset: u32) -> String {
    let found = if offset & COMMON_STRING_BIT == 0 {
        string_at(local, offset as usize)
    } else {
        string_at(COMMON_STRINGS.as_bytes(), (offset & !COMMON_STRING_BIT) as usize)
    };
    found.unwrap_or_else(|| offset.to_string())
}

/// One schema node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTreeNode {
    pub type_name: String,
    pub name: String,
    pub byte_size: i32,
    pub index: i32,
    pub type_flags: i32,
    pub version: i32,
    pub meta_flag: i32,
    pub level: u8,
    pub ref_type_hash: u64,
}

impl TypeTreeNode {
    pub fn new(level: u8, type_name: &str, name: &str, byte_size: i32, meta_flag: i32) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            byte_size,
            meta_flag,
            level,
            version: 1,
            ..Default::default()
        }
    }

    /// Align to 4 bytes after reading this node.
    #[inline]
    pub fn needs_align(&self) -> bool {
        self.meta_flag & FLAG_ALIGN != 0
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.type_flags & TYPE_FLAG_ARRAY != 0
    }
}

/// Flattened pre-order schema of one type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTree {
    pub nodes: Vec<TypeTreeNode>,
}

impl TypeTree {
    pub fn new(nodes: Vec<TypeTreeNode>) -> Self {
        Self { nodes }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root type name, e.g. `Mesh`.
    pub fn root_type(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.type_name.as_str())
    }

    /// Number of nodes in the subtree starting at `index`, the node itself
    /// included: it runs until the first later node at the same or a
    /// shallower level.
    pub fn subtree_len(&self, index: usize) -> usize {
        subtree_len(&self.nodes, index)
    }

    /// Blob layout used by format 10 and 12+.
    pub fn read_blob(r: &mut EndianReader<'_>, format: u32) -> Result<Self> {
        let node_count = r.read_count(24)?;
        let string_buffer_size = r.read_i32()?;
        if string_buffer_size < 0 {
            return Err(Error::invalid("negative type tree string buffer size"));
        }

        struct RawNode {
            version: u16,
            level: u8,
            type_flags: u8,
            type_offset: u32,
            name_offset: u32,
            byte_size: i32,
            index: i32,
            meta_flag: i32,
            ref_type_hash: u64,
        }

        let mut raw = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            raw.push(RawNode {
                version: r.read_u16()?,
                level: r.read_u8()?,
                type_flags: r.read_u8()?,
                type_offset: r.read_u32()?,
                name_offset: r.read_u32()?,
                byte_size: r.read_i32()?,
                index: r.read_i32()?,
                meta_flag: r.read_i32()?,
                ref_type_hash: if format >= 19 { r.read_u64()? } else { 0 },
            });
        }
        let strings = r.take(string_buffer_size as usize)?;

        let nodes = raw
            .into_iter()
            .map(|n| TypeTreeNode {
                type_name: resolve_string(strings, n.type_offset),
                name: resolve_string(strings, n.name_offset),
                byte_size: n.byte_size,
                index: n.index,
                type_flags: n.type_flags as i32,
                version: n.version as i32,
                meta_flag: n.meta_flag,
                level: n.level,
                ref_type_hash: n.ref_type_hash,
            })
            .collect();
        Ok(Self { nodes })
    }

    /// Recursive layout used by formats before 10 and format 11.
    pub fn read_legacy(r: &mut EndianReader<'_>, format: u32) -> Result<Self> {
        let mut nodes = Vec::new();
        read_legacy_node(r, format, 0, &mut nodes)?;
        Ok(Self { nodes })
    }
}

/// See [`TypeTree::subtree_len`].
pub fn subtree_len(nodes: &[TypeTreeNode], index: usize) -> usize {
    let Some(head) = nodes.get(index) else { return 0 };
    1 + nodes[index + 1..].iter().take_while(|n| n.level > head.level).count()
}

/// Dotted field path of `nodes[index]`, root record excluded.
pub fn node_path(nodes: &[TypeTreeNode], index: usize) -> String {
    let Some(node) = nodes.get(index) else { return format!("#{index}") };
    let mut parts = vec![node.name.as_str()];
    let mut level = node.level;
    for n in nodes[..index].iter().rev() {
        if n.level >= level {
            continue;
        }
        level = n.level;
        if level == 0 {
            break;
        }
        parts.push(n.name.as_str());
    }
    parts.reverse();
    parts.join(".")
}

fn read_legacy_node(r: &mut EndianReader<'_>, format: u32, level: u8, out: &mut Vec<TypeTreeNode>) -> Result<()> {
    let type_name = r.read_cstring()?;
    let name = r.read_cstring()?;
    let byte_size = r.read_i32()?;
    if format == 2 {
        r.read_i32()?; // variable count
    }
    let index = if format != 3 { r.read_i32()? } else { 0 };
    let type_flags = r.read_i32()?;
    let version = r.read_i32()?;
    let meta_flag = if format != 3 { r.read_i32()? } else { 0 };
    out.push(TypeTreeNode {
        type_name,
        name,
        byte_size,
        index,
        type_flags,
        version,
        meta_flag,
        level,
        ref_type_hash: 0,
    });

    let children = r.read_count(1)?;
    if level == u8::MAX {
        return Err(Error::invalid("type tree nested too deeply"));
    }
    for _ in 0..children {
        read_legacy_node(r, format, level + 1, out)?;
    }
    Ok(())
}
