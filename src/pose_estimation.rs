use crate::{
    config::PoseConfig,
    types::{RenderAnchors, Viewport},
    utils::{clamp_finite, wrap_angle},
};
use nalgebra::{Rotation3, Vector3};
use std::f64::consts::PI;

/// Head orientation in radians, applied yaw (Y) → pitch (X) → roll (Z)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadRotation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl HeadRotation {
    #[must_use]
    pub const fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Intrinsic Y-X-Z composition
    #[must_use]
    pub fn matrix(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll)
    }
}

/// Transform applied to the overlay root each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacialPose {
    /// World-space position of the overlay root (orthographic scene, y up)
    pub position: Vector3<f64>,
    pub rotation: HeadRotation,
    /// Uniform scale, always within the configured clamp range
    pub scale: f64,
}

impl Default for FacialPose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: HeadRotation::default(),
            scale: crate::constants::DEFAULT_SCALE,
        }
    }
}

/// Landmark-based head pose estimator.
///
/// This is a small-angle heuristic, not a full 3D solve: the overlay is drawn as
/// a face-anchored billboard, so yaw and pitch are recovered from how far the
/// nose sits from the eye midpoint relative to the eye distance.
#[derive(Debug, Clone, Default)]
pub struct PoseEstimator {
    config: PoseConfig,
}

impl PoseEstimator {
    #[must_use]
    pub fn new(config: PoseConfig) -> Self {
        log::debug!("Initializing PoseEstimator with {config:?}");
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// Estimate the overlay pose from render-space anchors.
    ///
    /// Deterministic: the same anchors and viewport always give the same pose.
    #[must_use]
    pub fn estimate_pose(&self, anchors: &RenderAnchors, viewport: Viewport) -> FacialPose {
        let center = anchors.eye_center();
        let eye_distance = anchors.eye_distance();

        let yaw = (anchors.nose.x - center.x).atan2(eye_distance);
        let pitch = (anchors.nose.y - center.y).atan2(eye_distance);
        let roll = Self::roll_from_eye_line(anchors);

        let (world_x, world_y) = viewport.to_world(center.x, center.y);
        let nose_z = anchors.nose.z.unwrap_or(0.0);
        let position = Vector3::new(
            world_x + yaw * self.config.yaw_lateral_gain,
            world_y,
            self.config.depth_scale * nose_z.mul_add(self.config.depth_nose_gain, self.config.depth_base),
        );

        FacialPose {
            position,
            rotation: HeadRotation::new(yaw, pitch, roll),
            scale: self.scale_from_ears(anchors),
        }
    }

    /// Roll of the eye line, offset by π so a level mirrored face reads 0
    #[must_use]
    pub fn roll_from_eye_line(anchors: &RenderAnchors) -> f64 {
        let eye_line = (anchors.right_eye.y - anchors.left_eye.y).atan2(anchors.right_eye.x - anchors.left_eye.x);
        wrap_angle(PI - eye_line)
    }

    /// Ear-to-ear width over the reference width, clamped.
    ///
    /// Missing ears or a non-finite width fall back to the default scale.
    #[must_use]
    pub fn scale_from_ears(&self, anchors: &RenderAnchors) -> f64 {
        let raw = anchors
            .ears()
            .map_or(f64::NAN, |(left, right)| left.distance_to(right) / self.config.reference_face_width);
        clamp_finite(raw, self.config.scale_min, self.config.scale_max, self.config.default_scale)
    }
}

/// Estimate a pose with the default constants
#[must_use]
pub fn estimate_pose(anchors: &RenderAnchors, viewport: Viewport) -> FacialPose {
    PoseEstimator::default().estimate_pose(anchors, viewport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RenderAnchors, RenderPoint};
    use proptest::prelude::*;

    fn level_anchors() -> RenderAnchors {
        RenderAnchors::new(
            RenderPoint::new(880.0, 360.0),
            RenderPoint::new(400.0, 360.0),
            RenderPoint::new(640.0, 400.0),
        )
    }

    #[test]
    fn test_level_mirrored_face_has_zero_roll() {
        let pose = estimate_pose(&level_anchors(), Viewport::new(1280.0, 720.0));
        assert!(pose.rotation.roll.abs() < 1e-9);
        assert!(pose.rotation.yaw.abs() < 1e-9);
        assert!(pose.rotation.pitch > 0.0);
    }

    #[test]
    fn test_position_tracks_eye_center() {
        let pose = estimate_pose(&level_anchors(), Viewport::new(1280.0, 720.0));
        assert!(pose.position.x.abs() < 1e-9);
        assert!(pose.position.y.abs() < 1e-9);
        assert!((pose.position.z - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_yaw_shifts_position_laterally() {
        let mut anchors = level_anchors();
        anchors.nose.x += 60.0;
        let pose = estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
        let expected_yaw = (60.0_f64).atan2(480.0);
        assert!((pose.rotation.yaw - expected_yaw).abs() < 1e-12);
        assert!((pose.position.x - expected_yaw * 190.0).abs() < 1e-9);
    }

    #[test]
    fn test_nose_depth_moves_overlay() {
        let mut anchors = level_anchors();
        anchors.nose.z = Some(-0.2);
        let pose = estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
        assert!((pose.position.z - 0.1 * (0.02 - 0.01)).abs() < 1e-12);
    }

    #[test]
    fn test_scale_defaults_without_ears() {
        let pose = estimate_pose(&level_anchors(), Viewport::new(1280.0, 720.0));
        assert_eq!(pose.scale, 1.0);
    }

    #[test]
    fn test_scale_from_ear_distance() {
        let anchors = level_anchors().with_ears(RenderPoint::new(1000.0, 360.0), RenderPoint::new(280.0, 360.0));
        // 720 / 240 = 3.0, above the clamp
        let pose = estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
        assert_eq!(pose.scale, 2.2);

        let anchors = level_anchors().with_ears(RenderPoint::new(760.0, 360.0), RenderPoint::new(520.0, 360.0));
        let pose = estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
        assert!((pose.scale - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_order_is_yaw_pitch_roll() {
        let rotation = HeadRotation::new(0.3, -0.2, 0.1);
        let expected = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.3)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), -0.2)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
        assert!((rotation.matrix().matrix() - expected.matrix()).norm() < 1e-12);

        let swapped = Rotation3::from_axis_angle(&Vector3::x_axis(), -0.2)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), 0.3)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
        assert!((rotation.matrix().matrix() - swapped.matrix()).norm() > 1e-6);
    }

    proptest! {
        #[test]
        fn prop_scale_always_clamped(ear_distance in 0.0f64..1e12) {
            let anchors = level_anchors()
                .with_ears(RenderPoint::new(0.0, 0.0), RenderPoint::new(ear_distance, 0.0));
            let pose = estimate_pose(&anchors, Viewport::new(1280.0, 720.0));
            prop_assert!(pose.scale >= 0.1 && pose.scale <= 2.2);
        }

        #[test]
        fn prop_roll_matches_eye_line(lx in 0.0f64..600.0, dx in 1.0f64..600.0, ly in 0.0f64..600.0, dy in -300.0f64..300.0) {
            let anchors = RenderAnchors::new(
                RenderPoint::new(lx, ly),
                RenderPoint::new(lx + dx, ly + dy),
                RenderPoint::new(lx + dx / 2.0, ly + 40.0),
            );
            let roll = PoseEstimator::roll_from_eye_line(&anchors);
            let expected = wrap_angle(PI - dy.atan2(dx));
            prop_assert!((roll - expected).abs() < 1e-9);
        }

        #[test]
        fn prop_estimation_is_deterministic(nx in 300.0f64..900.0, ny in 200.0f64..500.0) {
            let mut anchors = level_anchors();
            anchors.nose = RenderPoint::new(nx, ny);
            let viewport = Viewport::new(1280.0, 720.0);
            prop_assert_eq!(estimate_pose(&anchors, viewport), estimate_pose(&anchors, viewport));
        }
    }
}
