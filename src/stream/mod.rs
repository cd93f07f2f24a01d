//! Low-level byte access: container detection, byte storage and the
//! endianness-aware reader used by every parser.

pub mod format;
mod reader;
mod source;

pub use format::{detect, FileType};
pub use reader::{Endian, EndianReader};
pub use source::{ByteView, RandomAccess};
