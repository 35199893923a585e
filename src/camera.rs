//! Camera abstraction consumed by the temporal engine.
//!
//! Right-handed, Y-up, -Z forward camera math (standard GL-style look-at)
//! with wgpu (0..1) clip-space projection. The engine only reads matrices
//! and deltas from this type; it never mutates the camera.

use glam::{Mat4, Vec3};

/// Perspective camera with a look-at orientation.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fovy_deg: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
            fovy_deg: 45.0,
            aspect: 1.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    /// Set the projection parameters, returning self for chaining.
    pub fn with_projection(mut self, fovy_deg: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        self.fovy_deg = fovy_deg;
        self.aspect = aspect;
        self.znear = znear;
        self.zfar = zfar;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_deg.to_radians(), self.aspect, self.znear, self.zfar)
    }

    /// Combined view-projection matrix for the current frame.
    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera-to-world transform (inverse view matrix).
    pub fn world_transform(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Normalized view direction.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_is_normalized() {
        let cam = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let f = cam.forward();
        assert!((f.length() - 1.0).abs() < 1e-6);
        assert!((f - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_world_transform_round_trip() {
        let cam = Camera::new(Vec3::new(3.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        let round_trip = cam.world_transform() * cam.view_matrix();
        let diff: f32 = (round_trip - Mat4::IDENTITY)
            .to_cols_array()
            .iter()
            .map(|v| v.abs())
            .sum();
        assert!(diff < 1e-4, "view * inverse(view) should be identity");
    }

    #[test]
    fn test_view_proj_maps_target_inside_clip() {
        let cam = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .with_projection(60.0, 16.0 / 9.0, 0.1, 100.0);
        let clip = cam.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0, "wgpu clip space is 0..1");
    }
}
