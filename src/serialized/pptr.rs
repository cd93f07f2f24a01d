//! Typed weak references between objects.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

/// Reference to an object by `(file id, path id)`.
///
/// `file_id` 0 means the owning member itself; `n > 0` is the `n - 1`th entry
/// of the owner's external list. The pointer is only a lookup key; see
/// `LoadSession::resolve`.
#[derive(Serialize)]
#[serde(bound = "")]
pub struct PPtr<T = ()> {
    pub file_id: i32,
    pub path_id: i64,
    #[serde(skip)]
    _kind: PhantomData<fn() -> T>,
}

impl<T> PPtr<T> {
    pub const fn new(file_id: i32, path_id: i64) -> Self {
        Self { file_id, path_id, _kind: PhantomData }
    }

    pub const fn null() -> Self {
        Self::new(0, 0)
    }

    /// Points nowhere.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.path_id == 0 || self.file_id < 0
    }

    /// Same pointer viewed as another target kind.
    pub fn cast<U>(&self) -> PPtr<U> {
        PPtr::new(self.file_id, self.path_id)
    }
}

impl<T> Clone for PPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PPtr<T> {}

impl<T> PartialEq for PPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.file_id == other.file_id && self.path_id == other.path_id
    }
}

impl<T> Eq for PPtr<T> {}

impl<T> std::hash::Hash for PPtr<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.file_id.hash(state);
        self.path_id.hash(state);
    }
}

impl<T> Default for PPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for PPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PPtr({}, {})", self.file_id, self.path_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointer() {
        assert!(PPtr::<()>::null().is_null());
        assert!(PPtr::<()>::new(-1, 5).is_null());
        assert!(!PPtr::<()>::new(1, 5).is_null());
    }

    #[test]
    fn test_cast_keeps_identity() {
        struct Mesh;
        let p: PPtr<Mesh> = PPtr::new(2, -77);
        let q: PPtr = p.cast();
        assert_eq!((q.file_id, q.path_id), (2, -77));
    }
}
