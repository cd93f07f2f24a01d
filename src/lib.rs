//! # bundlekit
//!
//! Decoder for Unity serialized asset files, asset bundles and web build
//! data, including the bit-packed mesh and animation payloads they carry.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (errors, engine versions, math)
//! - [`stream`] - Byte storage, container detection, endian-aware reader
//! - [`core`] - Compression codecs, resource cache, progress
//! - [`bundle`] - Asset bundles (including multi-bundle files) and web files
//! - [`serialized`] - Serialized-object files, type trees, object pointers
//! - [`tree`] - Schema-driven generic object reader
//! - [`classes`] - Compiled decoders (Mesh, AnimationClip, Texture2D, ...)
//! - [`manager`] - Load sessions, dependency search and reference resolution
//!
//! ## Example
//!
//! ```ignore
//! use bundlekit::prelude::*;
//!
//! let mut session = LoadSession::new(LoadOptions::default());
//! let report = session.load_paths(&["Game_Data"]);
//!
//! for obj in session.objects() {
//!     if let Some(mesh) = session.resolve_as::<Mesh>(obj.member, &PPtr::new(0, obj.path_id)) {
//!         println!("{}: {} vertices", mesh.name, mesh.vertex_count);
//!     }
//! }
//! ```

pub mod util;
pub mod stream;
pub mod core;
pub mod bundle;
pub mod serialized;
pub mod tree;
pub mod classes;
pub mod manager;

// Re-export commonly used types
pub use util::{Error, Result, UnityVersion};
pub use manager::{LoadOptions, LoadReport, LoadSession};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, UnityVersion};
    pub use crate::classes::{
        AnimationClip, ClassId, DecodedObject, GameObject, Mesh, MeshFilter, ObjectKind, Sprite, SpriteAtlas,
        Texture2D, Transform,
    };
    pub use crate::manager::{LoadOptions, LoadReport, LoadSession};
    pub use crate::serialized::PPtr;
    pub use crate::tree::Value;
}
