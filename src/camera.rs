use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::render::CameraParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Desired rig position relative to the followed target.
    pub offset: Vec3,
    /// Look-at point relative to the followed target.
    pub look_ahead: Vec3,
    /// Fraction of the remaining distance covered each update, in `(0, 1]`.
    pub smoothing: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            offset: Vec3::new(-0.4, 0.18, 0.6),
            look_ahead: Vec3::new(0.4, 0.05, 0.0),
            smoothing: 0.9,
            fov: 50.0,
            near: 0.01,
            far: 50.0,
        }
    }
}

/// Where the camera is and what it looks at for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

impl CameraPose {
    pub fn view(&self) -> Mat4 {
        let forward = self.look_at - self.position;
        // look_at_rh degenerates when forward is parallel to up.
        let up = if forward.cross(Vec3::Y).length_squared() > 1e-8 {
            Vec3::Y
        } else {
            Vec3::Z
        };
        Mat4::look_at_rh(self.position, self.look_at, up)
    }
}

/// Follow camera with exponential smoothing towards an offset target.
///
/// The smoothing factor is applied once per update, so the effective lag
/// depends on the update rate. The rig snaps to its desired position on the
/// first update after construction or [`CameraRig::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    config: RigConfig,
    position: Option<Vec3>,
}

impl CameraRig {
    pub fn new(config: RigConfig) -> Self {
        Self {
            config,
            position: None,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = None;
    }

    pub fn desired_position(&self, target: Vec3) -> Vec3 {
        target + self.config.offset
    }

    pub fn update(&mut self, target: Vec3) -> CameraPose {
        let desired = self.desired_position(target);
        let factor = self.config.smoothing.clamp(f32::EPSILON, 1.0);
        let position = match self.position {
            Some(current) => current.lerp(desired, factor),
            None => desired,
        };
        self.position = Some(position);
        CameraPose {
            position,
            look_at: target + self.config.look_ahead,
        }
    }

    pub fn params(&self, pose: &CameraPose, aspect: f32) -> CameraParams {
        let projection = Mat4::perspective_rh(
            self.config.fov.to_radians(),
            aspect.max(0.01),
            self.config.near,
            self.config.far,
        );
        CameraParams {
            view_proj: projection * pose.view(),
            position: pose.position,
            near: self.config.near,
            far: self.config.far,
        }
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(RigConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_snaps_to_offset() {
        let mut rig = CameraRig::default();
        let pose = rig.update(Vec3::new(1.0, 0.0, 0.0));
        assert!(pose.position.distance(Vec3::new(0.6, 0.18, 0.6)) < 1e-6);
        assert!(pose.look_at.distance(Vec3::new(1.4, 0.05, 0.0)) < 1e-6);
    }

    #[test]
    fn follows_with_smoothing() {
        let mut rig = CameraRig::default();
        rig.update(Vec3::ZERO);
        let pose = rig.update(Vec3::new(1.0, 0.0, 0.0));
        let expected = Vec3::new(-0.4, 0.18, 0.6).lerp(Vec3::new(0.6, 0.18, 0.6), 0.9);
        assert!(pose.position.distance(expected) < 1e-6);
    }

    #[test]
    fn converges_on_stationary_target() {
        let mut rig = CameraRig::default();
        rig.update(Vec3::ZERO);
        let target = Vec3::new(2.0, 0.5, -1.0);
        let mut pose = rig.update(target);
        for _ in 0..20 {
            pose = rig.update(target);
        }
        assert!(pose.position.distance(rig.desired_position(target)) < 1e-5);
    }

    #[test]
    fn step_is_bounded_by_distance_to_desired() {
        let mut rig = CameraRig::default();
        let mut previous = rig.update(Vec3::ZERO).position;
        for step in 1..=50 {
            let target = Vec3::new(step as f32 * 0.05, 0.0, 0.0);
            let desired = rig.desired_position(target);
            let pose = rig.update(target);
            let moved = pose.position.distance(previous);
            assert!(moved <= 0.9 * desired.distance(previous) + 1e-6);
            previous = pose.position;
        }
    }

    #[test]
    fn reset_snaps_again() {
        let mut rig = CameraRig::default();
        rig.update(Vec3::ZERO);
        rig.reset();
        assert!(rig.position().is_none());
        let pose = rig.update(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(pose.position, rig.desired_position(Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn view_projection_is_finite() {
        let mut rig = CameraRig::default();
        let pose = rig.update(Vec3::new(-3.3, 0.09, 0.5));
        let params = rig.params(&pose, 16.0 / 9.0);
        assert!(params.view_proj.is_finite());
        let clip = params.view_proj * pose.look_at.extend(1.0);
        assert!(clip.w > 0.0);
    }

    #[test]
    fn vertical_view_direction_does_not_break() {
        let pose = CameraPose {
            position: Vec3::new(0.0, 5.0, 0.0),
            look_at: Vec3::ZERO,
        };
        assert!(pose.view().is_finite());
    }
}
