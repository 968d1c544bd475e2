//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Cube of edge `size` starting at `origin`
    pub fn from_origin_size(origin: Vec3, size: f32) -> Self {
        Self {
            min: origin,
            max: origin + Vec3::splat(size),
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if point is inside AABB
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_origin_size() {
        let aabb = Aabb::from_origin_size(Vec3::new(16.0, 0.0, -16.0), 16.0);
        assert_eq!(aabb.max, Vec3::new(32.0, 16.0, 0.0));
        assert_eq!(aabb.center(), Vec3::new(24.0, 8.0, -8.0));
        assert_eq!(aabb.size(), Vec3::splat(16.0));
    }

    #[test]
    fn test_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(!aabb.contains_point(Vec3::splat(2.0)));
    }
}
