//! Shared cache of open resource streams.
//!
//! Objects such as meshes and textures keep their large payloads in sibling
//! resource files (`.resS`, `.resource`) and refer to them by path, offset and
//! size. The cache maps a case-insensitive file name to one open
//! [`RandomAccess`] so that concurrent decoders share a single reader per file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::search::{file_name_of, find_file};
use crate::stream::RandomAccess;
use crate::util::{Error, Result};

/// Thread-safe name -> reader map.
///
/// Uses `parking_lot::RwLock` for the map; each reader guards its own
/// seek position.
pub struct ResourceCache {
    readers: RwLock<HashMap<String, Arc<RandomAccess>>>,
    use_mmap: bool,
    /// Bytes handed out, for diagnostics.
    bytes_read: AtomicUsize,
}

impl ResourceCache {
    pub fn new(use_mmap: bool) -> Self {
        Self {
            readers: RwLock::new(HashMap::new()),
            use_mmap,
            bytes_read: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Register a stream under `name` (e.g. a bundle's `CAB-xxx.resS`).
    /// An existing entry wins.
    pub fn register(&self, name: &str, stream: RandomAccess) {
        self.readers.write().entry(Self::key(name)).or_insert_with(|| Arc::new(stream));
    }

    /// Cached reader for a file name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<RandomAccess>> {
        self.readers.read().get(&Self::key(name)).cloned()
    }

    /// Find the reader for `resource_path`, opening it from disk next to
    /// `search_dir` (or anywhere below it) when it is not cached yet.
    pub fn resolve(&self, resource_path: &str, search_dir: Option<&Path>) -> Result<Arc<RandomAccess>> {
        let name = file_name_of(resource_path);
        if let Some(reader) = self.get(name) {
            return Ok(reader);
        }
        let path = search_dir
            .and_then(|dir| find_file(dir, name))
            .ok_or_else(|| Error::ResourceNotFound(name.to_string()))?;
        debug!("Opening resource file \"{}\"", path.display());
        let stream = RandomAccess::open(&path, self.use_mmap)?;

        let mut readers = self.readers.write();
        let entry = readers.entry(Self::key(name)).or_insert_with(|| Arc::new(stream));
        Ok(Arc::clone(entry))
    }

    /// Read `size` bytes at `offset` from the named resource.
    pub fn read(&self, resource_path: &str, search_dir: Option<&Path>, offset: u64, size: usize) -> Result<Vec<u8>> {
        let reader = self.resolve(resource_path, search_dir)?;
        let data = reader.read_at(offset, size)?;
        self.bytes_read.fetch_add(size, Ordering::Relaxed);
        Ok(data)
    }

    /// Drop every open reader.
    pub fn clear(&self) {
        self.readers.write().clear();
        self.bytes_read.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.readers.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes served since the last clear.
    #[inline]
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteView;

    #[test]
    fn test_registered_lookup_is_case_insensitive() {
        let cache = ResourceCache::default();
        cache.register("CAB-abc.resS", RandomAccess::View(ByteView::from_vec(vec![1, 2, 3, 4])));
        let data = cache.read("archive:/CAB-abc/cab-ABC.ress", None, 1, 2).unwrap();
        assert_eq!(data, vec![2, 3]);
        assert_eq!(cache.bytes_read(), 2);
    }

    #[test]
    fn test_disk_lookup_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("level0.resS"), b"0123456789").unwrap();

        let cache = ResourceCache::new(false);
        let data = cache.read("level0.resS", Some(dir.path()), 3, 4).unwrap();
        assert_eq!(data, b"3456");
        assert_eq!(cache.len(), 1);

        // Second lookup is served from the cache even without a directory
        assert!(cache.resolve("level0.resS", None).is_ok());
        cache.clear();
        assert!(cache.is_empty());
        assert!(matches!(cache.resolve("level0.resS", None), Err(Error::ResourceNotFound(_))));
    }
}
