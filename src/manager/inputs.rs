//! Input collection: directory walking and split-file merging.
//!
//! Large files in player builds are sometimes stored as `name.split0`,
//! `name.split1`, ... The parts are concatenated in index order, in memory,
//! and loaded under `name`. A complete `name` next to its parts wins.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::stream::ByteView;
use crate::util::{Error, Result};

const SPLIT_MARKER: &str = ".split";

/// `name.splitN` -> `(name, N)`.
pub fn split_index(name: &str) -> Option<(&str, u32)> {
    let at = name.rfind(SPLIT_MARKER)?;
    let index = name[at + SPLIT_MARKER.len()..].parse().ok()?;
    Some((&name[..at], index))
}

/// One file to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    /// Parts of a split file, in index order; `path` is the merged name.
    Split { path: PathBuf, parts: Vec<PathBuf> },
}

impl Input {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Split { path, .. } => path,
        }
    }

    pub fn file_name(&self) -> String {
        self.path().file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Bytes of the input, merging split parts.
    pub fn open(&self, use_mmap: bool) -> Result<ByteView> {
        match self {
            Self::File(path) => ByteView::open(path, use_mmap),
            Self::Split { path, parts } => {
                debug!("Merging {} parts of \"{}\"", parts.len(), path.display());
                let mut data = Vec::new();
                for part in parts {
                    data.extend_from_slice(&std::fs::read(part).map_err(|e| match e.kind() {
                        std::io::ErrorKind::NotFound => Error::FileNotFound(part.clone()),
                        _ => Error::Io(e),
                    })?);
                }
                Ok(ByteView::from_vec(data))
            }
        }
    }
}

/// Collected inputs plus the paths that did not exist.
#[derive(Debug, Default)]
pub struct Inputs {
    pub files: Vec<Input>,
    pub not_found: Vec<PathBuf>,
}

/// Expand `paths`: directories are walked recursively, split parts are
/// grouped.
pub fn collect_inputs<P: AsRef<Path>>(paths: &[P]) -> Inputs {
    let mut inputs = Inputs::default();
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path()),
            );
        } else if path.is_file() {
            files.push(path.to_path_buf());
        } else {
            warn!("Input \"{}\" does not exist", path.display());
            inputs.not_found.push(path.to_path_buf());
        }
    }
    inputs.files = group_splits(files);
    inputs
}

/// Replace split parts by one [`Input::Split`] at the position of the first
/// part seen. Parts after a missing index are dropped.
fn group_splits(files: Vec<PathBuf>) -> Vec<Input> {
    let mut seen = HashSet::new();
    let plain: HashSet<PathBuf> = files.iter().filter(|p| split_of(p).is_none()).cloned().collect();

    let mut groups: HashMap<PathBuf, BTreeMap<u32, PathBuf>> = HashMap::new();
    for file in &files {
        if let Some((base, index)) = split_of(file) {
            groups.entry(base).or_default().insert(index, file.clone());
        }
    }

    let mut out = Vec::new();
    for file in files {
        let Some((base, _)) = split_of(&file) else {
            if seen.insert(file.clone()) {
                out.push(Input::File(file));
            }
            continue;
        };
        if plain.contains(&base) || !seen.insert(base.clone()) {
            continue;
        }
        let Some(parts) = groups.remove(&base) else { continue };
        let parts: Vec<PathBuf> = parts
            .into_iter()
            .enumerate()
            .take_while(|(expected, (index, _))| *expected as u32 == *index)
            .map(|(_, (_, part))| part)
            .collect();
        if parts.is_empty() {
            warn!("Split file \"{}\" has no first part", base.display());
            continue;
        }
        out.push(Input::Split { path: base, parts });
    }
    out
}

fn split_of(path: &Path) -> Option<(PathBuf, u32)> {
    let name = path.file_name()?.to_str()?;
    let (base, index) = split_index(name)?;
    Some((path.with_file_name(base), index))
}

/// Merge split entries of an in-memory listing (zip archives). Returns
/// `(name, bytes)` with parts concatenated and plain entries untouched.
pub(crate) fn merge_split_entries(entries: Vec<(String, Vec<u8>)>) -> Vec<(String, Vec<u8>)> {
    let mut groups: BTreeMap<String, BTreeMap<u32, Vec<u8>>> = BTreeMap::new();
    let mut out = Vec::new();
    for (name, data) in entries {
        match split_index(&name) {
            Some((base, index)) => {
                groups.entry(base.to_string()).or_default().insert(index, data);
            }
            None => out.push((name, data)),
        }
    }
    for (base, parts) in groups {
        if out.iter().any(|(n, _)| *n == base) {
            continue;
        }
        let mut merged = Vec::new();
        for (expected, (index, part)) in parts.into_iter().enumerate() {
            if expected as u32 != index {
                break;
            }
            merged.extend(part);
        }
        out.push((base, merged));
    }
    out
}
