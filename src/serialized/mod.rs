//! Serialized-object files ("archive members").
//!
//! - [`SerializedFile`] - Header, type table, object directory and externals
//! - [`TypeTree`] - Embedded per-type schemas
//! - [`ObjectReader`] - Reader positioned on one object
//! - [`PPtr`] - Typed weak reference to another object

mod file;
mod object;
mod pptr;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;

pub use file::*;
pub use object::ObjectReader;
pub use pptr::PPtr;
pub use schema::{TypeTree, TypeTreeNode};
