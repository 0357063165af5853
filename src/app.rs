//! Glue shared by the native binary and the browser entry point: one
//! playback that owns the director and the diorama, plus the text the
//! headless mode prints.

use anyhow::{Context, Result};
use glam::Vec3;

use crate::camera::RigConfig;
use crate::choreography::Choreography;
use crate::diorama::Diorama;
use crate::director::{Director, FrameState};
use crate::particles::DustConfig;
use crate::render::CameraParams;
use crate::scene::Scene;
use crate::timeline::{ManualTime, TimeSource};

pub const TITLE: &str = "Miniature Chase - JAX & NINO";
pub const BRAND: &str = "JAX & NINO - Miniature Morning Chase";
pub const CREDITS: &str = "8s - Pixar-style";
pub const DEFAULT_SEED: u64 = 7;
pub const DEFAULT_FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub seed: u64,
    pub rig: RigConfig,
    pub dust: DustConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            rig: RigConfig::default(),
            dust: DustConfig::default(),
        }
    }
}

/// The animated diorama: frame driver plus the scene graph it poses.
#[derive(Debug)]
pub struct Playback {
    director: Director,
    diorama: Diorama,
    last_frame: Option<FrameState>,
}

impl Playback {
    pub fn new(config: &PlaybackConfig) -> Result<Self> {
        let choreography = Choreography::scripted().context("invalid actor route")?;
        let director = Director::new(choreography, config.rig, config.dust, config.seed);
        let diorama =
            Diorama::build(config.seed, config.dust.count).context("invalid ground route")?;
        Ok(Self {
            director,
            diorama,
            last_frame: None,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.diorama.scene
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    pub fn last_frame(&self) -> Option<&FrameState> {
        self.last_frame.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.director.is_finished()
    }

    /// Advances to wall-clock time `now` and poses the scene graph.
    pub fn step(&mut self, now: f64) -> &FrameState {
        let frame = self.director.advance(now);
        self.diorama.apply(&frame);
        self.last_frame.insert(frame)
    }

    /// Camera for the latest frame, or `None` before the first step.
    pub fn camera(&self, aspect: f32) -> Option<CameraParams> {
        self.last_frame
            .as_ref()
            .map(|frame| self.director.rig().params(&frame.camera, aspect))
    }
}

pub fn window_title(caption: Option<&str>) -> String {
    match caption {
        Some(text) => format!("{TITLE} | {text}"),
        None => TITLE.to_string(),
    }
}

pub fn format_vec(v: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", v.x, v.y, v.z)
}

/// One line per whole second of timeline, the last frame included.
pub fn sample_line(frame: &FrameState) -> Option<String> {
    let elapsed = frame.elapsed();
    let previous = elapsed - frame.tick.delta;
    let crossed = frame.index == 0 || elapsed.floor() != previous.floor() || frame.finished();
    crossed.then(|| {
        format!(
            "t={:.2}s jax={} nino={} camera={}",
            elapsed,
            format_vec(frame.poses.primary.body.position),
            format_vec(frame.poses.secondary.body.position),
            format_vec(frame.camera.position)
        )
    })
}

pub fn caption_line(frame: &FrameState) -> Option<String> {
    if !frame.caption_changed {
        return None;
    }
    match &frame.caption {
        Some(text) => Some(format!("[{:.2}s] {text}", frame.elapsed())),
        None if frame.index > 0 => Some(format!("[{:.2}s] (caption cleared)", frame.elapsed())),
        None => None,
    }
}

pub fn final_state(frame: &FrameState) -> Vec<String> {
    vec![
        "Final state:".to_string(),
        format!(" - jax pos={}", format_vec(frame.poses.primary.body.position)),
        format!(" - nino pos={}", format_vec(frame.poses.secondary.body.position)),
        format!(
            " - camera pos={} look={}",
            format_vec(frame.camera.position),
            format_vec(frame.camera.look_at)
        ),
    ]
}

/// Runs the whole timeline at a fixed frame rate without a window and
/// returns the report lines.
pub fn headless_report(config: &PlaybackConfig, fps: u32) -> Result<Vec<String>> {
    let mut playback = Playback::new(config)?;
    let scene = playback.scene();
    let mut lines = vec![
        format!("{BRAND} ({CREDITS})"),
        format!(
            "Built diorama with {} nodes ({} meshes)",
            scene.nodes.len(),
            scene.mesh_count()
        ),
    ];

    let step = 1.0 / f64::from(fps.max(1));
    let mut time = ManualTime::new();
    loop {
        let frame = playback.step(time.now_seconds());
        lines.extend(caption_line(frame));
        lines.extend(sample_line(frame));
        if frame.finished() {
            lines.push(format!("Finished after {} frames", frame.index + 1));
            lines.extend(final_state(frame));
            return Ok(lines);
        }
        time.advance(step);
    }
}

/// Bookkeeping for a self-rescheduling frame loop: the callback that keeps
/// it alive and the handle of the frame request in flight.
#[derive(Debug)]
pub struct FrameLoop<C> {
    callback: Option<C>,
    pending: Option<i32>,
}

impl<C> Default for FrameLoop<C> {
    fn default() -> Self {
        Self {
            callback: None,
            pending: None,
        }
    }
}

impl<C> FrameLoop<C> {
    pub fn is_running(&self) -> bool {
        self.callback.is_some()
    }

    /// Installs the callback. Returns `false` and keeps the current one if a
    /// loop is already running.
    pub fn install(&mut self, callback: C) -> bool {
        if self.is_running() {
            return false;
        }
        self.callback = Some(callback);
        true
    }

    pub fn callback(&self) -> Option<&C> {
        self.callback.as_ref()
    }

    pub fn pending(&self) -> Option<i32> {
        self.pending
    }

    pub fn requested(&mut self, handle: i32) {
        self.pending = Some(handle);
    }

    /// The requested frame has fired.
    pub fn fired(&mut self) {
        self.pending = None;
    }

    /// Ends the loop, handing back the request to cancel and the callback
    /// to drop.
    pub fn stop(&mut self) -> (Option<i32>, Option<C>) {
        (self.pending.take(), self.callback.take())
    }
}
