//! Links derived after all members of a load are decoded.
//!
//! Decoded objects stay exactly as read; anything that depends on another
//! object (a GameObject's typed components, a sprite's effective atlas)
//! lives here, keyed by [`ObjectKey`].

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::LoadSession;
use crate::classes::{ClassId, DecodedObject, ObjectCast, ObjectKind, Sprite, SpriteAtlas};

/// Session-wide identity of a decoded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectKey {
    pub member: usize,
    pub path_id: i64,
}

impl ObjectKey {
    pub fn of(obj: &DecodedObject) -> Self {
        Self { member: obj.member, path_id: obj.path_id }
    }
}

/// Components of one GameObject, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameObjectLinks {
    /// Transform or RectTransform.
    pub transform: Option<ObjectKey>,
    pub mesh_renderer: Option<ObjectKey>,
    pub mesh_filter: Option<ObjectKey>,
    pub skinned_mesh_renderer: Option<ObjectKey>,
    pub animator: Option<ObjectKey>,
    pub animation: Option<ObjectKey>,
}

impl GameObjectLinks {
    fn assign(&mut self, class_id: ClassId, key: ObjectKey) {
        let slot = match class_id {
            ClassId::Transform | ClassId::RectTransform => &mut self.transform,
            ClassId::MeshRenderer => &mut self.mesh_renderer,
            ClassId::MeshFilter => &mut self.mesh_filter,
            ClassId::SkinnedMeshRenderer => &mut self.skinned_mesh_renderer,
            ClassId::Animator => &mut self.animator,
            ClassId::Animation => &mut self.animation,
            _ => return,
        };
        *slot = Some(key);
    }
}

#[derive(Debug, Default)]
pub struct Relations {
    game_objects: HashMap<ObjectKey, GameObjectLinks>,
    sprite_atlases: HashMap<ObjectKey, ObjectKey>,
}

impl Relations {
    pub(crate) fn build(session: &LoadSession) -> Self {
        let mut relations = Self::default();
        for obj in session.objects() {
            match &obj.kind {
                ObjectKind::GameObject(go) => {
                    let mut links = GameObjectLinks::default();
                    for component in &go.components {
                        if let Some(target) = session.resolve(obj.member, component) {
                            links.assign(target.class_id, ObjectKey::of(target));
                        }
                    }
                    relations.game_objects.insert(ObjectKey::of(obj), links);
                }
                ObjectKind::SpriteAtlas(atlas) => relations.link_atlas(session, obj, atlas),
                _ => {}
            }
        }
        relations
    }

    /// A packed sprite belongs to `atlas` unless its own pointer names a
    /// resolvable, non-variant atlas.
    fn link_atlas(&mut self, session: &LoadSession, obj: &DecodedObject, atlas: &SpriteAtlas) {
        let atlas_key = ObjectKey::of(obj);
        for packed in &atlas.packed_sprites {
            let Some(sprite_obj) = session.resolve(obj.member, packed) else { continue };
            let Some(sprite) = Sprite::cast(&sprite_obj.kind) else { continue };
            let own = sprite.sprite_atlas;
            let relink = if own.is_null() {
                true
            } else {
                match session.resolve_as(sprite_obj.member, &own) {
                    Some(current) => current.is_variant,
                    None => {
                        debug!(
                            "\"{}\": The actual SpriteAtlas PathID \"{}\" does not match the specified one \"{}\"",
                            sprite.name, obj.path_id, own.path_id
                        );
                        true
                    }
                }
            };
            if relink {
                self.sprite_atlases.insert(ObjectKey::of(sprite_obj), atlas_key);
            }
        }
    }

    pub fn game_object(&self, key: ObjectKey) -> Option<&GameObjectLinks> {
        self.game_objects.get(&key)
    }

    pub fn game_objects(&self) -> impl Iterator<Item = (&ObjectKey, &GameObjectLinks)> {
        self.game_objects.iter()
    }

    /// Atlas assigned to a sprite by its packing atlas, when that differs
    /// from (or replaces) the sprite's own pointer.
    pub fn sprite_atlas(&self, sprite: ObjectKey) -> Option<ObjectKey> {
        self.sprite_atlases.get(&sprite).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.game_objects.is_empty() && self.sprite_atlases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_roles() {
        let mut links = GameObjectLinks::default();
        let key = |p| ObjectKey { member: 0, path_id: p };
        links.assign(ClassId::RectTransform, key(1));
        links.assign(ClassId::MeshFilter, key(2));
        links.assign(ClassId::MonoBehaviour, key(3));
        links.assign(ClassId::Animator, key(4));
        assert_eq!(links.transform, Some(key(1)));
        assert_eq!(links.mesh_filter, Some(key(2)));
        assert_eq!(links.animator, Some(key(4)));
        assert_eq!(links.mesh_renderer, None);
    }
}
