//! Math type re-exports and engine-specific geometric records.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use std::fmt;

/// Axis-aligned box stored as center and half-extent.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub center: Vec3,
    pub extent: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(center: Vec3, extent: Vec3) -> Self {
        Self { center, extent }
    }

    /// Minimum corner.
    #[inline]
    pub fn min(&self) -> Vec3 {
        self.center - self.extent
    }

    /// Maximum corner.
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.center + self.extent
    }
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aabb({:?} +/- {:?})", self.center, self.extent)
    }
}

/// Float rectangle (`Rectf`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}
