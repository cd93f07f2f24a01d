//! Core services shared by the container decoders and the load session.
//!
//! - [`compression`] - Block and wrapper codecs
//! - [`ResourceCache`] - Shared open resource streams
//! - [`Progress`] - Load progress reporting
//! - File lookup helpers for dependencies and resources

pub mod compression;
mod cache;
mod progress;
mod search;

pub use cache::ResourceCache;
pub use compression::{CompressionChoice, CompressionType};
pub use progress::{Progress, ProgressFn};
pub use search::{file_name_of, find_file};
