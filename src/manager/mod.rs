//! Load orchestration.
//!
//! - [`LoadSession`] - Loads files, follows dependencies, decodes objects
//!   and resolves references
//! - [`LoadOptions`] - Version override, codecs, class filter, threading
//! - [`LoadReport`] - Per-file and per-object failures of one load
//! - [`Relations`] - Links derived after decoding

mod inputs;
mod options;
mod relations;
mod report;
mod session;

pub use inputs::{collect_inputs, split_index, Input, Inputs};
pub use options::LoadOptions;
pub use relations::{GameObjectLinks, ObjectKey, Relations};
pub use report::{LoadFailure, LoadReport};
pub use session::{ArchiveMember, LoadSession};
