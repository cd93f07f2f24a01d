//! Error types for bundlekit.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for asset decoding operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Bundle signature or layout version this decoder does not handle
    #[error("Unsupported bundle: {0}")]
    UnsupportedBundle(String),

    /// Embedded engine version was stripped and no override was supplied
    #[error("The asset's Unity version has been stripped, please set the version in the options ({file}){}",
        .assumed.as_ref().map(|v| format!("; assumed Unity version based on asset bundle: {v}")).unwrap_or_default())]
    StrippedVersion { file: String, assumed: Option<String> },

    /// Version string could not be parsed or is incomplete
    #[error("Invalid Unity version: {0}")]
    InvalidVersion(String),

    /// Block or wrapper decompression failed
    #[error("{codec} decompression failed: {reason}")]
    Decompression { codec: &'static str, reason: String },

    /// Codec tag known but not implemented
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// A single object failed to decode
    #[error("Failed to decode {class} (path id {path_id}) in {member}: {source}")]
    ObjectDecode {
        member: String,
        path_id: i64,
        class: String,
        #[source]
        source: Box<Error>,
    },

    /// Resource stream referenced by an object could not be located
    #[error("Can't find the resource file {0}")]
    ResourceNotFound(String),

    /// Stream is truncated or corrupted
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Type tree whose node layout cannot drive a decode
    #[error("Invalid type tree at {node}: {reason}")]
    InvalidSchema { node: String, reason: String },

    /// Field missing from a schema-decoded tree
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Submesh topology that has no triangle-list equivalent
    #[error("Unsupported topology: {0}")]
    UnsupportedTopology(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a decompression error for the given codec.
    pub fn decompression(codec: &'static str, reason: impl ToString) -> Self {
        Self::Decompression { codec, reason: reason.to_string() }
    }

    /// True for the stripped-version failure, which callers can fix by
    /// supplying a version override.
    pub fn is_stripped_version(&self) -> bool {
        matches!(self, Self::StrippedVersion { .. })
    }
}

/// Result type alias for bundlekit operations.
pub type Result<T> = std::result::Result<T, Error>;
