//! Byte storage backing every parsed container.
//!
//! Loaded files live either in a memory map or in an owned buffer. Bundles,
//! web files and multi-bundle segments are zero-copy [`ByteView`]s into that
//! storage. Resource streams opened straight from disk in buffered mode use
//! [`RandomAccess::File`], whose seek-and-read is serialized by a lock.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::util::{Error, Result};

enum Storage {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Owned buffer (decompressed blocks, merged split files, small files)
    Owned(Box<[u8]>),
}

impl Storage {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Mmap(m) => m,
            Storage::Owned(b) => b,
        }
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Cheaply clonable window into shared byte storage.
#[derive(Clone)]
pub struct ByteView {
    storage: Arc<Storage>,
    start: usize,
    len: usize,
}

impl ByteView {
    /// Open a file, memory-mapping it when `use_mmap` is set.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut file = open_file(path)?;
        let size = file.metadata()?.len() as usize;

        let storage = if use_mmap && size > 0 {
            // Safety: the file is opened read-only; callers must not truncate it while loaded
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            Storage::Mmap(mmap)
        } else {
            let mut buf = Vec::with_capacity(size);
            file.read_to_end(&mut buf)?;
            Storage::Owned(buf.into_boxed_slice())
        };
        let len = storage.bytes().len();
        Ok(Self { storage: Arc::new(storage), start: 0, len })
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self { storage: Arc::new(Storage::Owned(data.into_boxed_slice())), start: 0, len }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[self.start..self.start + self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset of this view inside its backing storage.
    #[inline]
    pub fn base_offset(&self) -> usize {
        self.start
    }

    /// Sub-view of `len` bytes at `offset`.
    pub fn slice(&self, offset: u64, len: u64) -> Result<Self> {
        let end = offset.checked_add(len).ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.len as u64 {
            return Err(Error::UnexpectedEof(end));
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            start: self.start + offset as usize,
            len: len as usize,
        })
    }

    /// Sub-view from `offset` to the end.
    pub fn slice_from(&self, offset: u64) -> Result<Self> {
        if offset > self.len as u64 {
            return Err(Error::UnexpectedEof(offset));
        }
        self.slice(offset, self.len as u64 - offset)
    }
}

impl Deref for ByteView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("start", &self.start).field("len", &self.len).finish()
    }
}

/// Positioned reads over a resource stream.
pub enum RandomAccess {
    /// In-memory or mapped bytes, read without locking
    View(ByteView),
    /// Buffered file access; seeks are guarded per reader
    File { file: Mutex<File>, len: u64 },
}

impl RandomAccess {
    /// Open a file on disk, mapped or buffered.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        if use_mmap {
            return Ok(Self::View(ByteView::open(path, true)?));
        }
        let file = open_file(path)?;
        let len = file.metadata()?.len();
        Ok(Self::File { file: Mutex::new(file), len })
    }

    pub fn len(&self) -> u64 {
        match self {
            Self::View(v) => v.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `size` bytes at `offset`.
    pub fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(size as u64).ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.len() {
            return Err(Error::UnexpectedEof(end));
        }
        match self {
            Self::View(v) => Ok(v.as_bytes()[offset as usize..end as usize].to_vec()),
            Self::File { file, .. } => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; size];
                f.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for RandomAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::View(v) => f.debug_tuple("View").field(v).finish(),
            Self::File { len, .. } => f.debug_struct("File").field("len", len).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_view_slicing() {
        let view = ByteView::from_vec((0u8..32).collect());
        let sub = view.slice(4, 8).unwrap();
        assert_eq!(sub.as_bytes(), &[4, 5, 6, 7, 8, 9, 10, 11]);
        let nested = sub.slice_from(6).unwrap();
        assert_eq!(&*nested, &[10, 11]);
        assert_eq!(nested.base_offset(), 10);
        assert!(matches!(sub.slice(4, 5), Err(Error::UnexpectedEof(9))));
    }

    #[test]
    fn test_open_modes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"resource-bytes").unwrap();
        tmp.flush().unwrap();

        for use_mmap in [true, false] {
            let view = ByteView::open(tmp.path(), use_mmap).unwrap();
            assert_eq!(view.as_bytes(), b"resource-bytes");

            let ra = RandomAccess::open(tmp.path(), use_mmap).unwrap();
            assert_eq!(ra.len(), 14);
            assert_eq!(ra.read_at(9, 5).unwrap(), b"bytes");
            assert!(ra.read_at(10, 5).is_err());
        }
    }

    #[test]
    fn test_missing_file() {
        let err = ByteView::open("/nonexistent/file.assets", false).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
