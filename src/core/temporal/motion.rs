//! Camera motion damping for history blending.
//!
//! Reprojection accuracy degrades under fast rotation or translation, so
//! the history weight is scaled down by a motion factor derived from the
//! delta between consecutive camera transforms.

use glam::{Mat4, Vec3};

/// Tracks consecutive camera transforms and produces a damping factor.
#[derive(Debug, Clone)]
pub struct CameraMotionTracker {
    prev_transform: Option<Mat4>,
    prev_position: Option<Vec3>,
    /// Scale on the rotation delta (1 - dot of forward axes).
    rotation_damping: f32,
    /// Scale on the world-space translation distance.
    position_damping: f32,
    motion_factor: f32,
}

impl CameraMotionTracker {
    pub fn new(rotation_damping: f32, position_damping: f32) -> Self {
        Self {
            prev_transform: None,
            prev_position: None,
            rotation_damping,
            position_damping,
            motion_factor: 1.0,
        }
    }

    /// Update from the current camera-to-world transform and world position.
    ///
    /// Returns the motion factor in [0, 1]: 1 when the camera is still,
    /// falling toward 0 as rotation or translation speed rises. The very
    /// first update has no prior transform to compare against and reports 1.
    pub fn update(&mut self, world_transform: Mat4, position: Vec3) -> f32 {
        let factor = match (self.prev_transform, self.prev_position) {
            (Some(prev_transform), Some(prev_position)) => {
                let rotation_delta =
                    1.0 - forward_axis(prev_transform).dot(forward_axis(world_transform));
                let position_delta = prev_position.distance(position);

                let rotation_factor = (1.0 - rotation_delta * self.rotation_damping).max(0.0);
                let position_factor = (1.0 - position_delta * self.position_damping).max(0.0);
                rotation_factor.min(position_factor)
            }
            _ => 1.0,
        };

        self.prev_transform = Some(world_transform);
        self.prev_position = Some(position);
        self.motion_factor = factor;
        factor
    }

    /// Most recent motion factor.
    #[inline]
    pub fn motion_factor(&self) -> f32 {
        self.motion_factor
    }

    /// History weight after motion damping, clamped to [0, base].
    #[inline]
    pub fn effective_history_weight(&self, base_history_weight: f32) -> f32 {
        (base_history_weight * self.motion_factor).clamp(0.0, base_history_weight)
    }

    /// Forget the previous transform; the next update reports no motion.
    pub fn reset(&mut self) {
        self.prev_transform = None;
        self.prev_position = None;
        self.motion_factor = 1.0;
    }
}

/// Forward axis of a camera-to-world transform (-Z column, normalized).
#[inline]
fn forward_axis(transform: Mat4) -> Vec3 {
    (-transform.z_axis.truncate()).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;

    fn tracker() -> CameraMotionTracker {
        CameraMotionTracker::new(10.0, 0.5)
    }

    #[test]
    fn test_first_update_reports_no_motion() {
        let mut tracker = tracker();
        let cam = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let factor = tracker.update(cam.world_transform(), cam.position);
        assert_eq!(factor, 1.0);
    }

    #[test]
    fn test_static_camera_keeps_factor_at_one() {
        let mut tracker = tracker();
        let cam = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        for _ in 0..3 {
            let factor = tracker.update(cam.world_transform(), cam.position);
            assert!((factor - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_translation_damps_monotonically() {
        let mut previous_factor = 1.0;
        for step in [0.1f32, 0.5, 1.0, 2.0, 5.0] {
            let mut tracker = tracker();
            let cam = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
            tracker.update(cam.world_transform(), cam.position);

            let moved = Camera::new(Vec3::new(step, 0.0, 5.0), Vec3::new(step, 0.0, 0.0), Vec3::Y);
            let factor = tracker.update(moved.world_transform(), moved.position);
            assert!(factor >= 0.0);
            assert!(factor <= previous_factor, "factor should fall as motion grows");
            previous_factor = factor;
        }
        // 2 units of travel at 0.5 scale zeroes the factor entirely
        assert_eq!(previous_factor, 0.0);
    }

    #[test]
    fn test_rotation_damps_factor() {
        let mut tracker = tracker();
        let cam = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        tracker.update(cam.world_transform(), cam.position);

        // Same position, view swung sideways: pure rotation
        let turned = Camera::new(Vec3::ZERO, Vec3::new(1.0, 0.0, -1.0), Vec3::Y);
        let factor = tracker.update(turned.world_transform(), turned.position);
        assert!(factor < 1.0);
        assert!(factor >= 0.0);
    }

    #[test]
    fn test_effective_weight_clamped_to_base() {
        let mut tracker = tracker();
        assert_eq!(tracker.effective_history_weight(0.85), 0.85);

        let cam = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        tracker.update(cam.world_transform(), cam.position);
        let moved = Camera::new(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, -1.0),
            Vec3::Y,
        );
        tracker.update(moved.world_transform(), moved.position);
        assert_eq!(tracker.effective_history_weight(0.85), 0.0);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut tracker = tracker();
        let cam = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        tracker.update(cam.world_transform(), cam.position);
        tracker.reset();

        let far = Camera::new(
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, -1.0),
            Vec3::Y,
        );
        // A teleport right after reset must not read as motion.
        assert_eq!(tracker.update(far.world_transform(), far.position), 1.0);
    }
}
