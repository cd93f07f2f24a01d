//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`UnityVersion`] - Engine version tags
//! - [`VersionGate`] - Version-range predicates for optional fields
//! - Math type re-exports from glam

mod error;
mod version;
mod math;

pub use error::*;
pub use version::*;
pub use math::*;
