use glam::Vec3;
use log::{debug, info};

use crate::camera::{CameraPose, CameraRig, RigConfig};
use crate::choreography::{Choreography, Poses};
use crate::particles::{DustConfig, DustField};
use crate::path::CurveError;
use crate::timeline::{Clock, Tick, TimeSource};

/// Everything the render boundary needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub index: u64,
    pub tick: Tick,
    pub poses: Poses,
    pub camera: CameraPose,
    pub dust: Vec<Vec3>,
    pub caption: Option<String>,
    /// True when the caption differs from the previous frame's.
    pub caption_changed: bool,
}

impl FrameState {
    pub fn elapsed(&self) -> f32 {
        self.tick.elapsed
    }

    pub fn finished(&self) -> bool {
        self.tick.finished
    }
}

/// Owns the state that carries over between frames: the clock, the
/// camera rig and the dust. Poses themselves are recomputed from scratch.
#[derive(Debug)]
pub struct Director {
    clock: Clock,
    choreography: Choreography,
    rig: CameraRig,
    dust: DustField,
    frames: u64,
    last_caption: Option<usize>,
    seed: u64,
}

impl Director {
    pub fn new(choreography: Choreography, rig: RigConfig, dust: DustConfig, seed: u64) -> Self {
        Self {
            clock: Clock::new(choreography.duration()),
            choreography,
            rig: CameraRig::new(rig),
            dust: DustField::new(dust, seed),
            frames: 0,
            last_caption: None,
            seed,
        }
    }

    pub fn scripted(seed: u64) -> Result<Self, CurveError> {
        Ok(Self::new(
            Choreography::scripted()?,
            RigConfig::default(),
            DustConfig::default(),
            seed,
        ))
    }

    pub fn choreography(&self) -> &Choreography {
        &self.choreography
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn dust(&self) -> &DustField {
        &self.dust
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    /// Rewinds to the first frame. The next [`Director::advance`] restarts
    /// the clock.
    pub fn restart(&mut self) {
        self.clock = Clock::new(self.choreography.duration());
        self.rig.reset();
        self.dust = DustField::new(*self.dust.config(), self.seed);
        self.frames = 0;
        self.last_caption = None;
    }

    pub fn advance_from(&mut self, source: &impl TimeSource) -> FrameState {
        self.advance(source.now_seconds())
    }

    /// Produces the frame for wall-clock time `now`.
    pub fn advance(&mut self, now: f64) -> FrameState {
        let was_finished = self.clock.is_finished();
        let tick = self.clock.tick(now);
        let poses = self.choreography.evaluate(tick.elapsed);
        let target = poses.primary.body.position;
        let camera = self.rig.update(target);
        if !was_finished {
            self.dust.update(tick.delta, target, self.frames == 0);
        }

        let caption_changed = poses.caption != self.last_caption || self.frames == 0;
        self.last_caption = poses.caption;
        let caption = self
            .choreography
            .caption(&poses)
            .map(|caption| caption.text.clone());
        if caption_changed {
            match &caption {
                Some(text) => info!("[{:.2}s] {text}", tick.elapsed),
                None if self.frames > 0 => info!("[{:.2}s] caption cleared", tick.elapsed),
                None => {}
            }
        }
        if tick.elapsed.floor() != (tick.elapsed - tick.delta).floor() {
            debug!(
                "t={:.2} primary={:?} secondary={:?} camera={:?}",
                tick.elapsed, target, poses.secondary.body.position, camera.position
            );
        }
        if tick.finished && !was_finished {
            info!("timeline finished after {} frames", self.frames + 1);
        }

        let frame = FrameState {
            index: self.frames,
            tick,
            poses,
            camera,
            dust: self.dust.positions().to_vec(),
            caption,
            caption_changed,
        };
        self.frames += 1;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{ManualTime, DURATION_S};

    #[test]
    fn first_frame_starts_clock_and_snaps_camera() {
        let mut director = Director::scripted(1).unwrap();
        let frame = director.advance(100.0);
        assert_eq!(frame.index, 0);
        assert_eq!(frame.elapsed(), 0.0);
        let expected = director.rig().desired_position(frame.poses.primary.body.position);
        assert_eq!(frame.camera.position, expected);
        assert!(frame.caption.is_none());
    }

    #[test]
    fn runs_to_completion_at_fixed_step() {
        let mut director = Director::scripted(1).unwrap();
        let mut time = ManualTime::new();
        let mut frames = 0;
        loop {
            let frame = director.advance_from(&time);
            frames += 1;
            if frame.finished() {
                assert_eq!(frame.elapsed(), DURATION_S);
                break;
            }
            time.advance(1.0 / 30.0);
            assert!(frames < 1000);
        }
        assert!(director.is_finished());
        assert!((240..=242).contains(&frames));
    }

    #[test]
    fn caption_changes_are_flagged_once() {
        let mut director = Director::scripted(1).unwrap();
        let mut changes = Vec::new();
        for step in 0..=80 {
            let frame = director.advance(step as f64 * 0.1);
            if frame.caption_changed {
                changes.push((step, frame.caption.is_some()));
            }
        }
        let shown: Vec<_> = changes.iter().filter(|(_, on)| *on).collect();
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn restart_rewinds() {
        let mut director = Director::scripted(1).unwrap();
        director.advance(0.0);
        director.advance(9.0);
        assert!(director.is_finished());
        director.restart();
        assert!(!director.is_finished());
        assert_eq!(director.frames(), 0);
        let frame = director.advance(50.0);
        assert_eq!(frame.elapsed(), 0.0);
    }

    #[test]
    fn dust_freezes_after_the_end() {
        let mut director = Director::scripted(1).unwrap();
        director.advance(0.0);
        let last = director.advance(9.0);
        assert!(last.finished());
        for now in [10.0, 60.0] {
            let frame = director.advance(now);
            assert!(frame.finished());
            assert_eq!(frame.elapsed(), DURATION_S);
            assert_eq!(frame.dust, last.dust);
        }
    }
}
