//! Multi-file containers: asset bundles (including concatenated
//! multi-bundle files) and web build data files.

mod file;
mod web;

pub use file::{
    BundleFile, BundleHeader, BundleOptions, BundleSegments, DirectoryNode, StorageBlock, StreamFile,
    FLAG_BLOCKS_AND_DIRECTORY_COMBINED, FLAG_BLOCKS_INFO_AT_END, FLAG_BLOCK_INFO_NEED_PADDING_AT_START,
    FLAG_OLD_WEB_PLUGIN_COMPATIBILITY,
    NODE_FLAG_SERIALIZED,
};
pub use web::WebFile;
