//! Elapsed-time source shared by every animated component.
//!
//! The clock saturates at its duration and never runs backwards; once it
//! reports `finished` the driver stops requesting refreshes.

/// Length of the whole animation in seconds.
pub const DURATION_S: f32 = 8.0;

/// Monotonic time source, in seconds since an arbitrary origin.
pub trait TimeSource {
    fn now_seconds(&self) -> f64;
}

/// Wall clock backed by [`std::time::Instant`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct InstantSource {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl InstantSource {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for InstantSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TimeSource for InstantSource {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Deterministic source advanced by hand, used for headless runs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualTime {
    now: f64,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
    }
}

impl TimeSource for ManualTime {
    fn now_seconds(&self) -> f64 {
        self.now
    }
}

/// One clock reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub elapsed: f32,
    /// Seconds since the previous tick, zero on the first one.
    pub delta: f32,
    pub finished: bool,
}

/// Elapsed-time clock clamped to `[0, duration]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    duration: f32,
    start: Option<f64>,
    elapsed: f32,
}

impl Clock {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            start: None,
            elapsed: 0.0,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.start.is_some() && self.elapsed >= self.duration
    }

    /// Pins the start of the timeline to `now`.
    pub fn start(&mut self, now: f64) {
        self.start = Some(now);
        self.elapsed = 0.0;
    }

    /// Reads the clock at `now`. The first tick also starts it.
    pub fn tick(&mut self, now: f64) -> Tick {
        let start = *self.start.get_or_insert(now);
        let raw = ((now - start) as f32).clamp(0.0, self.duration);
        let elapsed = raw.max(self.elapsed);
        let delta = elapsed - self.elapsed;
        self.elapsed = elapsed;
        Tick {
            elapsed,
            delta,
            finished: elapsed >= self.duration,
        }
    }

    pub fn tick_from(&mut self, source: &impl TimeSource) -> Tick {
        self.tick(source.now_seconds())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DURATION_S)
    }
}
