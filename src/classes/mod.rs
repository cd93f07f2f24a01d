//! Object decoders.
//!
//! Each compiled decoder implements [`ObjectDecoder`] and is registered in a
//! lookup table keyed by [`ClassId`]. An object is decoded from its schema
//! tree when the member carries one (and the decoder understands trees),
//! from its raw bytes otherwise. Classes without a compiled decoder become
//! [`ObjectKind::Generic`] and keep only their schema tree.

pub mod animation;
pub mod base;
pub mod class_id;
pub mod game_object;
pub mod layout;
pub mod mesh;
pub mod packed;
pub mod sprite;
pub mod texture2d;

use std::sync::Arc;

use tracing::{debug, trace};

pub use animation::AnimationClip;
pub use base::StreamingInfo;
pub use class_id::ClassId;
pub use game_object::{GameObject, MeshFilter, Transform};
pub use mesh::Mesh;
pub use sprite::{Sprite, SpriteAtlas};
pub use texture2d::{ImageData, Texture2D};

use crate::core::ResourceCache;
use crate::serialized::{ObjectInfo, ObjectReader, SerializedFile};
use crate::tree::{check_schema, read_object_tree, TypelessMode, Value};
use crate::util::{Error, Result};
use layout::FromTree;

/// Shared state a decoder may need beyond the object bytes.
pub struct DecodeContext<'a> {
    pub resources: &'a ResourceCache,
    pub use_type_tree: bool,
    pub typeless: TypelessMode,
}

impl<'a> DecodeContext<'a> {
    pub fn new(resources: &'a ResourceCache) -> Self {
        Self { resources, use_type_tree: true, typeless: TypelessMode::Skip }
    }

    /// Bytes of an external payload, resolved next to the owning member.
    pub fn read_resource(&self, file: &SerializedFile, info: &StreamingInfo) -> Result<Vec<u8>> {
        self.resources.read(&info.path, file.directory(), info.offset, info.size as usize)
    }
}

/// Typed payload of a decoded object.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Mesh(Box<Mesh>),
    AnimationClip(Box<AnimationClip>),
    Texture2D(Box<Texture2D>),
    GameObject(GameObject),
    Transform(Transform),
    MeshFilter(MeshFilter),
    Sprite(Box<Sprite>),
    SpriteAtlas(Box<SpriteAtlas>),
    /// No compiled decoder; see [`DecodedObject::tree`].
    Generic,
}

impl ObjectKind {
    /// Display name carried by the payload itself.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Mesh(m) => Some(&m.name),
            Self::AnimationClip(c) => Some(&c.name),
            Self::Texture2D(t) => Some(&t.name),
            Self::GameObject(g) => Some(&g.name),
            Self::Sprite(s) => Some(&s.name),
            Self::SpriteAtlas(a) => Some(&a.name),
            Self::Transform(_) | Self::MeshFilter(_) | Self::Generic => None,
        }
    }
}

/// One object of a loaded member.
#[derive(Debug, Clone)]
pub struct DecodedObject {
    pub path_id: i64,
    pub class_id: ClassId,
    /// Index of the owning member in the session.
    pub member: usize,
    pub member_name: Arc<str>,
    pub byte_size: u32,
    pub name: Option<String>,
    pub kind: ObjectKind,
    /// Schema tree, when the object was decoded through one.
    pub tree: Option<Value>,
}

/// A compiled decoder for one engine class.
pub trait ObjectDecoder: Sized {
    /// Decode from raw bytes, with explicit version branches.
    fn decode(r: &mut ObjectReader<'_>, ctx: &DecodeContext<'_>) -> Result<Self>;

    /// Decode from a schema tree. `None` when only the binary layout is
    /// supported.
    fn decode_tree(tree: &Value) -> Option<Result<Self>>;

    fn into_kind(self) -> ObjectKind;
}

/// Borrow a typed payload back out of an [`ObjectKind`].
pub trait ObjectCast {
    fn cast(kind: &ObjectKind) -> Option<&Self>;
}

macro_rules! object_types {
    ($($ty:ident => $variant:ident($wrap:expr), tree: $tree:expr, binary: $binary:expr;)*) => {
        $(
            impl ObjectDecoder for $ty {
                fn decode(r: &mut ObjectReader<'_>, ctx: &DecodeContext<'_>) -> Result<Self> {
                    let read: fn(&mut ObjectReader<'_>, &DecodeContext<'_>) -> Result<Self> = $binary;
                    read(r, ctx)
                }

                fn decode_tree(tree: &Value) -> Option<Result<Self>> {
                    let read: fn(&Value) -> Option<Result<Self>> = $tree;
                    read(tree)
                }

                fn into_kind(self) -> ObjectKind {
                    ObjectKind::$variant($wrap(self))
                }
            }

            impl ObjectCast for $ty {
                fn cast(kind: &ObjectKind) -> Option<&Self> {
                    match kind {
                        ObjectKind::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

// Mesh stream data and compressed channels need the binary layout, so its
// schema tree is only kept for dumping.
object_types! {
    Mesh => Mesh(Box::new), tree: |_| None, binary: Mesh::read;
    AnimationClip => AnimationClip(Box::new), tree: |t| Some(AnimationClip::from_tree(t)), binary: |r, _| AnimationClip::read(r);
    Texture2D => Texture2D(Box::new), tree: |t| Some(Texture2D::from_tree(t)), binary: |r, _| Texture2D::read(r);
    GameObject => GameObject(std::convert::identity), tree: |t| Some(GameObject::from_tree(t)), binary: |r, _| GameObject::read(r);
    Transform => Transform(std::convert::identity), tree: |t| Some(Transform::from_tree(t)), binary: |r, _| Transform::read(r);
    MeshFilter => MeshFilter(std::convert::identity), tree: |t| Some(MeshFilter::from_tree(t)), binary: |r, _| MeshFilter::read(r);
    Sprite => Sprite(Box::new), tree: |t| Some(Sprite::from_tree(t)), binary: |r, _| Sprite::read(r);
    SpriteAtlas => SpriteAtlas(Box::new), tree: |t| Some(SpriteAtlas::from_tree(t)), binary: |r, _| SpriteAtlas::read(r);
}

type BinaryFn = fn(&mut ObjectReader<'_>, &DecodeContext<'_>) -> Result<ObjectKind>;
type TreeFn = fn(&Value) -> Option<Result<ObjectKind>>;

/// Lookup-table entry for one class.
pub struct DecoderEntry {
    pub class_id: ClassId,
    binary: BinaryFn,
    tree: TreeFn,
}

fn binary_of<T: ObjectDecoder>(r: &mut ObjectReader<'_>, ctx: &DecodeContext<'_>) -> Result<ObjectKind> {
    T::decode(r, ctx).map(T::into_kind)
}

fn tree_of<T: ObjectDecoder>(tree: &Value) -> Option<Result<ObjectKind>> {
    T::decode_tree(tree).map(|res| res.map(T::into_kind))
}

const fn entry<T: ObjectDecoder>(class_id: ClassId) -> DecoderEntry {
    DecoderEntry { class_id, binary: binary_of::<T>, tree: tree_of::<T> }
}

static DECODERS: &[DecoderEntry] = &[
    entry::<GameObject>(ClassId::GameObject),
    entry::<Transform>(ClassId::Transform),
    entry::<Transform>(ClassId::RectTransform),
    entry::<Texture2D>(ClassId::Texture2D),
    entry::<MeshFilter>(ClassId::MeshFilter),
    entry::<Mesh>(ClassId::Mesh),
    entry::<AnimationClip>(ClassId::AnimationClip),
    entry::<Sprite>(ClassId::Sprite),
    entry::<SpriteAtlas>(ClassId::SpriteAtlas),
];

/// Compiled decoder for a class, if any.
pub fn decoder_for(class_id: ClassId) -> Option<&'static DecoderEntry> {
    DECODERS.iter().find(|e| e.class_id == class_id)
}

/// Decode one object of `file`.
///
/// Errors are wrapped with the member, path id and class so that callers
/// can report and drop the single object.
pub fn decode_object(
    file: &SerializedFile,
    info: &ObjectInfo,
    member: usize,
    member_name: &Arc<str>,
    ctx: &DecodeContext<'_>,
) -> Result<DecodedObject> {
    let class_id = ClassId(info.class_id);
    trace!(member = %member_name, path_id = info.path_id, class = %class_id, "decode");
    let wrap = |e: Error| Error::ObjectDecode {
        member: member_name.to_string(),
        path_id: info.path_id,
        class: class_id.to_string(),
        source: Box::new(e),
    };

    let (kind, tree) = decode_kind(file, info, class_id, ctx).map_err(wrap)?;
    let name = match kind.name() {
        Some(n) => Some(n.to_owned()),
        None => tree.as_ref().and_then(base::tree_name),
    };
    Ok(DecodedObject {
        path_id: info.path_id,
        class_id,
        member,
        member_name: member_name.clone(),
        byte_size: info.byte_size,
        name,
        kind,
        tree,
    })
}

fn decode_kind(
    file: &SerializedFile,
    info: &ObjectInfo,
    class_id: ClassId,
    ctx: &DecodeContext<'_>,
) -> Result<(ObjectKind, Option<Value>)> {
    let mut r = file.object_reader(info)?;
    let schema = if ctx.use_type_tree { file.type_tree(info) } else { None };
    let entry = decoder_for(class_id);

    let Some(schema) = schema else {
        return match entry {
            Some(e) => Ok(((e.binary)(&mut r, ctx)?, None)),
            None => Ok((ObjectKind::Generic, None)),
        };
    };

    check_schema(schema)?;
    let read = read_object_tree(&mut r, schema, ctx.typeless);
    if !read.complete {
        debug!(path_id = info.path_id, class = %class_id, consumed = read.consumed, expected = info.byte_size, "partial type tree");
    }
    let kind = match entry {
        Some(e) => match (e.tree)(&read.value) {
            Some(decoded) => decoded?,
            None => {
                r.reset();
                (e.binary)(&mut r, ctx)?
            }
        },
        None => ObjectKind::Generic,
    };
    Ok((kind, Some(read.value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_table() {
        assert!(decoder_for(ClassId::Mesh).is_some());
        assert!(decoder_for(ClassId::RectTransform).is_some());
        assert!(decoder_for(ClassId::MonoBehaviour).is_none());
        let mut ids: Vec<_> = DECODERS.iter().map(|e| e.class_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), DECODERS.len());
    }

    #[test]
    fn test_cast() {
        let kind = GameObject { name: "A".into(), ..Default::default() }.into_kind();
        assert_eq!(GameObject::cast(&kind).map(|g| g.name.as_str()), Some("A"));
        assert!(Transform::cast(&kind).is_none());
        assert_eq!(kind.name(), Some("A"));
        assert!(Mesh::decode_tree(&Value::Bool(true)).is_none());
    }
}
