//! View frustum for culling

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from view-projection matrix (Gribb/Hartmann)
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let near = Self::normalize_plane(rows[3] + rows[2]);
        let far = Self::normalize_plane(rows[3] - rows[2]);
        let left = Self::normalize_plane(rows[3] + rows[0]);
        let right = Self::normalize_plane(rows[3] - rows[0]);
        let top = Self::normalize_plane(rows[3] - rows[1]);
        let bottom = Self::normalize_plane(rows[3] + rows[1]);

        Self {
            planes: [near, far, left, right, top, bottom],
        }
    }

    /// Frustum that accepts everything. Every plane has a zero normal and a
    /// positive offset, so every point is in front of it.
    pub fn unbounded() -> Self {
        Self {
            planes: [Plane::new(Vec3::ZERO, 1.0); 6],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = plane.truncate();
        let len = normal.length();
        if len > 0.0 {
            Plane::new(normal / len, plane.w / len)
        } else {
            Plane::new(Vec3::ZERO, 1.0)
        }
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // p-vertex: corner most aligned with the plane normal
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_neg_z() -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&proj)
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_planes_normalized() {
        for plane in &looking_down_neg_z().planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_aabb_in_front() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -5.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_aabb_behind_and_beyond() {
        let frustum = looking_down_neg_z();
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0));
        let beyond = Aabb::new(Vec3::new(-1.0, -1.0, -200.0), Vec3::new(1.0, 1.0, -150.0));
        let far_left = Aabb::new(Vec3::new(-1000.0, -1.0, -10.0), Vec3::new(-999.0, 1.0, -5.0));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(!frustum.intersects_aabb(&beyond));
        assert!(!frustum.intersects_aabb(&far_left));
    }

    #[test]
    fn test_unbounded_accepts_everything() {
        let frustum = Frustum::unbounded();
        let aabb = Aabb::new(Vec3::splat(-1e6), Vec3::splat(-1e6 + 1.0));
        assert!(frustum.intersects_aabb(&aabb));
        assert!(frustum.contains_point(Vec3::new(3.0, -9.0, 1e5)));
    }
}
