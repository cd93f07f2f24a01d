//! Schema-driven generic object reader.
//!
//! Turns any object with an embedded [`TypeTree`](crate::serialized::TypeTree)
//! into an ordered [`Value`] tree without compiled knowledge of its type.

mod reader;
mod value;

pub use reader::{check_schema, read_object_tree, read_tree, TreeRead, TypelessMode};
pub use value::Value;
