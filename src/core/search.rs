//! File-system lookups shared by dependency and resource resolution.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Last path component of a stored path, accepting both separators
/// (`archive:/CAB-x/CAB-x.resS` -> `CAB-x.resS`).
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Find `name` in `dir`: first as a direct child, then anywhere below it.
/// Names compare case-insensitively.
pub fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|e| e.into_path())
}
