//! Camera state consumed by the visibility engine

use crate::core::types::{IVec3, Mat4, Quat, Vec3};
use crate::math::Frustum;
use crate::voxel::chunk::ChunkCoord;

/// Camera with position, rotation, and projection parameters
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    /// World position (in blocks)
    pub position: Vec3,
    /// Rotation as quaternion
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.05,
            far: 1024.0,
        }
    }

    /// Create camera looking at a target
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        let rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));

        Self {
            rotation,
            ..Self::new(position, 70.0, 16.0 / 9.0)
        }
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation.conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// View frustum for the current pose
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Set rotation from euler angles (yaw, pitch in radians)
    pub fn set_rotation_euler(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0);
    }

    /// Yaw and pitch in degrees, derived from the forward vector
    pub fn euler_degrees(&self) -> (f32, f32) {
        let f = self.forward();
        let yaw = f.z.atan2(f.x);
        let pitch = (-f.y).clamp(-1.0, 1.0).asin();
        (yaw.to_degrees(), pitch.to_degrees())
    }

    /// Block containing the camera
    pub fn block_pos(&self) -> IVec3 {
        self.position.floor().as_ivec3()
    }

    /// Chunk containing the camera
    pub fn chunk_coord(&self) -> ChunkCoord {
        ChunkCoord::from_block(self.block_pos())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(8.0, 8.0, 8.0), 70.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_default() {
        let camera = Camera::default();
        let forward = camera.forward();
        assert!((forward.z - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_view_matrix_translation() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(10.0, 0.0, 0.0);

        let origin_in_camera = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 0.001);
    }

    #[test]
    fn test_block_and_chunk_coord() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(-0.5, 17.2, 33.9);
        assert_eq!(camera.block_pos(), IVec3::new(-1, 17, 33));
        assert_eq!(camera.chunk_coord(), ChunkCoord::new(-1, 1, 2));
    }

    #[test]
    fn test_euler_degrees_tracks_yaw() {
        let mut camera = Camera::default();
        let (yaw_a, _) = camera.euler_degrees();
        camera.set_rotation_euler(10f32.to_radians(), 0.0);
        let (yaw_b, pitch_b) = camera.euler_degrees();
        assert!(((yaw_a - yaw_b).abs() - 10.0).abs() < 0.01);
        assert!(pitch_b.abs() < 0.01);
    }

    #[test]
    fn test_frustum_sees_forward() {
        let camera = Camera::default();
        let frustum = camera.frustum();
        let ahead = camera.position + camera.forward() * 20.0;
        assert!(frustum.contains_point(ahead));
        let behind = camera.position - camera.forward() * 20.0;
        assert!(!frustum.contains_point(behind));
    }
}
