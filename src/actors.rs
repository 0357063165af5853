//! Per-frame pose laws for the two characters.
//!
//! Both laws are pure functions of elapsed time. The primary actor follows
//! its spline; the secondary actor uses its own parametric sweep and does
//! not sample any curve.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::path::{CatmullRomCurve, CurveError};
use crate::pose::Pose;

/// Control points of the primary actor's drive line.
pub const PRIMARY_ROUTE: [Vec3; 6] = [
    Vec3::new(-3.3, 0.09, 0.5),
    Vec3::new(-2.0, 0.09, 0.15),
    Vec3::new(-0.8, 0.09, -0.1),
    Vec3::new(0.8, 0.09, -0.15),
    Vec3::new(2.2, 0.09, 0.0),
    Vec3::new(3.3, 0.09, 0.35),
];

/// Normalised progress `elapsed / duration`, clamped to `[0, 1]`.
pub fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 || elapsed.is_nan() {
        return 0.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Local axis that should point along the direction of travel.
    pub reference_axis: Vec3,
    /// Wheel rotation in radians per second of elapsed time.
    pub wheel_spin_rate: f32,
    pub face_wobble_rate: f32,
    pub face_wobble_amplitude: f32,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            reference_axis: Vec3::X,
            wheel_spin_rate: 4.0,
            face_wobble_rate: 2.0,
            face_wobble_amplitude: 0.05,
        }
    }
}

/// Pose of the primary actor and its secondary motion channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryPose {
    pub u: f32,
    pub body: Pose,
    /// Wheel rotation about the axle, in radians.
    pub wheel_spin: f32,
    /// Face yaw, in radians.
    pub face_yaw: f32,
}

/// The lead character: drives along its curve, facing the tangent.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryActor {
    curve: CatmullRomCurve,
    config: PrimaryConfig,
}

impl PrimaryActor {
    pub fn new(curve: CatmullRomCurve, config: PrimaryConfig) -> Self {
        Self { curve, config }
    }

    /// The lead character on its authored route.
    pub fn scripted() -> Result<Self, CurveError> {
        let curve = CatmullRomCurve::centripetal(PRIMARY_ROUTE.to_vec())?;
        Ok(Self::new(curve, PrimaryConfig::default()))
    }

    pub fn curve(&self) -> &CatmullRomCurve {
        &self.curve
    }

    pub fn config(&self) -> &PrimaryConfig {
        &self.config
    }

    pub fn pose(&self, elapsed: f32, duration: f32) -> PrimaryPose {
        let u = progress(elapsed, duration);
        let position = self.curve.point_at(u);
        let orientation = self.curve.orientation_at(u, self.config.reference_axis);
        // Spin is visual only; it is not tied to distance travelled.
        let time = if elapsed.is_finite() { elapsed } else { 0.0 };
        PrimaryPose {
            u,
            body: Pose::new(position, orientation),
            wheel_spin: time * self.config.wheel_spin_rate,
            face_yaw: (time * self.config.face_wobble_rate).sin() * self.config.face_wobble_amplitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryConfig {
    /// Seconds the secondary actor trails the start of the timeline.
    pub delay: f32,
    /// Upper bound of the secondary actor's progress; always below 1.
    pub progress_cap: f32,
    pub start_x: f32,
    pub sweep: f32,
    pub lateral_amplitude: f32,
    pub lateral_frequency: f32,
    pub lateral_bias: f32,
    pub base_height: f32,
    pub bob_amplitude: f32,
    pub bob_frequency: f32,
    pub yaw_amplitude: f32,
    pub yaw_frequency: f32,
    pub bag_sway_amplitude: f32,
    pub bag_sway_rate: f32,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            delay: 0.25,
            progress_cap: 0.95,
            start_x: -3.6,
            sweep: 7.0,
            lateral_amplitude: 0.32,
            lateral_frequency: PI * 1.6,
            lateral_bias: 0.02,
            base_height: 0.12,
            bob_amplitude: 0.02,
            bob_frequency: 20.0,
            yaw_amplitude: 0.1,
            yaw_frequency: 8.0,
            bag_sway_amplitude: 0.5,
            bag_sway_rate: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryPose {
    pub u: f32,
    pub body: Pose,
    /// Bag roll about its local Z axis, in radians.
    pub bag_sway: f32,
}

/// The trailing character: a direct parametric sweep with a weave.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SecondaryActor {
    config: SecondaryConfig,
}

impl SecondaryActor {
    pub fn new(config: SecondaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SecondaryConfig {
        &self.config
    }

    /// Delayed progress in `[0, progress_cap]`.
    pub fn progress(&self, elapsed: f32, duration: f32) -> f32 {
        if duration <= 0.0 || elapsed.is_nan() {
            return 0.0;
        }
        let cap = self.config.progress_cap.clamp(0.0, 1.0);
        let shifted = (elapsed - self.config.delay).max(0.0);
        (shifted / duration).clamp(0.0, cap)
    }

    pub fn pose(&self, elapsed: f32, duration: f32) -> SecondaryPose {
        let c = &self.config;
        let u = self.progress(elapsed, duration);
        let position = Vec3::new(
            c.start_x + c.sweep * u,
            c.base_height + c.bob_amplitude * (u * c.bob_frequency).sin(),
            c.lateral_amplitude * (u * c.lateral_frequency).sin() + c.lateral_bias,
        );
        let yaw = c.yaw_amplitude * (u * c.yaw_frequency).sin();
        // The bag swings on raw time so it keeps moving while progress is capped.
        let time = if elapsed.is_finite() { elapsed } else { 0.0 };
        SecondaryPose {
            u,
            body: Pose::new(position, Quat::from_rotation_y(yaw)),
            bag_sway: c.bag_sway_amplitude * (time * c.bag_sway_rate).sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::DURATION_S;

    #[test]
    fn primary_starts_and_ends_on_route() {
        let actor = PrimaryActor::scripted().unwrap();
        let start = actor.pose(0.0, DURATION_S);
        let end = actor.pose(DURATION_S, DURATION_S);
        assert_eq!(start.body.position, PRIMARY_ROUTE[0]);
        assert_eq!(end.body.position, PRIMARY_ROUTE[5]);
        assert_eq!(start.wheel_spin, 0.0);
        assert_eq!(end.wheel_spin, 32.0);
    }

    #[test]
    fn primary_faces_direction_of_travel() {
        let actor = PrimaryActor::scripted().unwrap();
        let pose = actor.pose(4.0, DURATION_S);
        let forward = pose.body.orientation * Vec3::X;
        let ahead = actor.pose(4.05, DURATION_S).body.position - pose.body.position;
        assert!(forward.dot(ahead.normalize()) > 0.99);
    }

    #[test]
    fn primary_past_duration_holds_final_position() {
        let actor = PrimaryActor::scripted().unwrap();
        let late = actor.pose(20.0, DURATION_S);
        assert_eq!(late.u, 1.0);
        assert_eq!(late.body.position, PRIMARY_ROUTE[5]);
    }

    #[test]
    fn face_wobble_is_bounded() {
        let actor = PrimaryActor::scripted().unwrap();
        for step in 0..=80 {
            let pose = actor.pose(step as f32 * 0.1, DURATION_S);
            assert!(pose.face_yaw.abs() <= 0.05 + f32::EPSILON);
        }
    }

    #[test]
    fn secondary_waits_for_delay() {
        let actor = SecondaryActor::default();
        assert_eq!(actor.progress(0.0, DURATION_S), 0.0);
        assert_eq!(actor.progress(0.25, DURATION_S), 0.0);
        assert!(actor.progress(0.5, DURATION_S) > 0.0);
        let start = actor.pose(0.1, DURATION_S);
        assert!((start.body.position.x + 3.6).abs() < 1e-6);
        assert!((start.body.position.z - 0.02).abs() < 1e-6);
        assert!((start.body.position.y - 0.12).abs() < 1e-6);
    }

    #[test]
    fn secondary_progress_is_capped() {
        let actor = SecondaryActor::default();
        assert_eq!(actor.progress(DURATION_S, DURATION_S), 0.95);
        let end = actor.pose(DURATION_S, DURATION_S);
        assert!((end.body.position.x - 3.05).abs() < 1e-5);
    }

    #[test]
    fn secondary_handles_degenerate_duration() {
        let actor = SecondaryActor::default();
        assert_eq!(actor.progress(3.0, 0.0), 0.0);
        assert!(actor.pose(3.0, 0.0).body.is_finite());
    }

    #[test]
    fn bag_keeps_swinging_after_progress_caps() {
        let actor = SecondaryActor::default();
        let a = actor.pose(7.9, DURATION_S);
        let b = actor.pose(8.0, DURATION_S);
        assert_eq!(a.u, b.u);
        assert_ne!(a.bag_sway, b.bag_sway);
    }

    #[test]
    fn progress_guards_zero_duration() {
        assert_eq!(progress(4.0, 0.0), 0.0);
        assert_eq!(progress(4.0, 8.0), 0.5);
        assert_eq!(progress(-1.0, 8.0), 0.0);
    }
}
