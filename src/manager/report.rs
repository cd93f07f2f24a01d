//! Outcome of a load.

use std::fmt;

use crate::util::Error;

/// A file, member or object that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    /// Input path, or `container/member` for archive members.
    pub path: String,
    /// Set for per-object failures.
    pub path_id: Option<i64>,
    pub error: Error,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path_id {
            Some(id) => write!(f, "{} [{}]: {}", self.path, id, self.error),
            None => write!(f, "{}: {}", self.path, self.error),
        }
    }
}

/// What a [`LoadSession::load_paths`](super::LoadSession::load_paths) call
/// managed to decode, and what it had to skip.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Inputs read, including discovered dependencies.
    pub files: usize,
    /// Serialized members added to the session.
    pub members: usize,
    pub objects: usize,
    pub failures: Vec<LoadFailure>,
    /// External dependencies that could not be located.
    pub missing_dependencies: Vec<String>,
    /// Set when the cancel flag stopped the load early.
    pub cancelled: bool,
}

impl LoadReport {
    pub(crate) fn fail(&mut self, path: impl Into<String>, path_id: Option<i64>, error: Error) {
        self.failures.push(LoadFailure { path: path.into(), path_id, error });
    }

    /// Nothing failed and nothing was missing.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.missing_dependencies.is_empty()
    }

    /// Failures that an explicit version override would fix.
    pub fn stripped_versions(&self) -> impl Iterator<Item = &LoadFailure> {
        self.failures.iter().filter(|f| f.error.is_stripped_version())
    }

    /// Per-object decode failures.
    pub fn object_failures(&self) -> impl Iterator<Item = &LoadFailure> {
        self.failures.iter().filter(|f| f.path_id.is_some())
    }
}
