use serde::{Deserialize, Serialize};

use crate::actors::{PrimaryActor, PrimaryPose, SecondaryActor, SecondaryPose};
use crate::captions::{Caption, CaptionTrack};
use crate::path::CurveError;
use crate::timeline::DURATION_S;

/// Everything that is a pure function of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Poses {
    pub elapsed: f32,
    pub primary: PrimaryPose,
    pub secondary: SecondaryPose,
    /// Index into the caption track, if a line is showing.
    pub caption: Option<usize>,
}

/// The authored script: both actors and the dialogue on one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Choreography {
    duration: f32,
    primary: PrimaryActor,
    secondary: SecondaryActor,
    captions: CaptionTrack,
}

impl Choreography {
    pub fn new(
        duration: f32,
        primary: PrimaryActor,
        secondary: SecondaryActor,
        captions: CaptionTrack,
    ) -> Self {
        Self {
            duration,
            primary,
            secondary,
            captions,
        }
    }

    pub fn scripted() -> Result<Self, CurveError> {
        Ok(Self::new(
            DURATION_S,
            PrimaryActor::scripted()?,
            SecondaryActor::default(),
            CaptionTrack::scripted(),
        ))
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn primary(&self) -> &PrimaryActor {
        &self.primary
    }

    pub fn secondary(&self) -> &SecondaryActor {
        &self.secondary
    }

    pub fn captions(&self) -> &CaptionTrack {
        &self.captions
    }

    pub fn caption(&self, poses: &Poses) -> Option<&Caption> {
        poses
            .caption
            .and_then(|index| self.captions.entries().get(index))
    }

    pub fn evaluate(&self, elapsed: f32) -> Poses {
        Poses {
            elapsed,
            primary: self.primary.pose(elapsed, self.duration),
            secondary: self.secondary.pose(elapsed, self.duration),
            caption: self.captions.active_index(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_is_pure() {
        let choreography = Choreography::scripted().unwrap();
        for step in 0..=16 {
            let elapsed = step as f32 * 0.5;
            let a = choreography.evaluate(elapsed);
            let b = choreography.evaluate(elapsed);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn captions_follow_script() {
        let choreography = Choreography::scripted().unwrap();
        let silent = choreography.evaluate(0.5);
        assert!(choreography.caption(&silent).is_none());
        let jax = choreography.evaluate(1.0);
        assert!(choreography.caption(&jax).unwrap().text.starts_with("JAX"));
        let nino = choreography.evaluate(4.0);
        assert!(choreography.caption(&nino).unwrap().text.starts_with("NINO"));
    }

    #[test]
    fn secondary_trails_primary() {
        let choreography = Choreography::scripted().unwrap();
        for step in 1..=8 {
            let poses = choreography.evaluate(step as f32);
            assert!(poses.secondary.u < poses.primary.u);
        }
    }

    #[test]
    fn boundary_poses_are_finite() {
        let choreography = Choreography::scripted().unwrap();
        for elapsed in [0.0, DURATION_S] {
            let poses = choreography.evaluate(elapsed);
            assert!(poses.primary.body.is_finite());
            assert!(poses.secondary.body.is_finite());
            assert!(poses.primary.wheel_spin.is_finite());
            assert!(poses.secondary.bag_sway.is_finite());
        }
    }
}
