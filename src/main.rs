use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use miniature_chase::app::{
    final_state, headless_report, window_title, Playback, PlaybackConfig, DEFAULT_FPS,
    DEFAULT_SEED,
};
use miniature_chase::timeline::{InstantSource, TimeSource};
use miniature_chase::Renderer;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = PlaybackConfig {
        seed: options.seed,
        ..PlaybackConfig::default()
    };

    if options.summary_only {
        return run_headless(&config, options.fps);
    }
    match run_interactive(&config) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&config, options.fps)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(config: &PlaybackConfig, fps: u32) -> Result<()> {
    for line in headless_report(config, fps)? {
        println!("{line}");
    }
    Ok(())
}

fn run_interactive(config: &PlaybackConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let playback = Playback::new(config)?;
    let scene = playback.scene();
    info!(
        "Built diorama with {} nodes ({} meshes)",
        scene.nodes.len(),
        scene.mesh_count()
    );

    let mut viewer = Viewer {
        playback,
        clock: InstantSource::new(),
        window: None,
        renderer: None,
        shown_caption: None,
        init_error: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut viewer)
        .context("event loop terminated abnormally")?;

    if let Some(err) = viewer.init_error {
        return Err(err.into());
    }
    if let Some(err) = viewer.last_error {
        return Err(err);
    }
    if let Some(frame) = viewer.playback.last_frame() {
        for line in final_state(frame) {
            println!("{line}");
        }
    }
    Ok(())
}

struct Viewer {
    playback: Playback,
    clock: InstantSource,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    shown_caption: Option<String>,
    init_error: Option<WindowInitError>,
    last_error: Option<anyhow::Error>,
}

impl Viewer {
    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<(), WindowInitError> {
        let attributes = Window::default_attributes()
            .with_title(window_title(None))
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let renderer = block_on(Renderer::new(Arc::clone(&window), &self.playback.scene().lighting))
            .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;
        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Advances the timeline and draws. Returns `true` once it has finished.
    fn redraw(&mut self) -> Result<bool> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(false);
        };
        let frame = self.playback.step(self.clock.now_seconds());
        let finished = frame.finished();
        if frame.caption != self.shown_caption {
            self.shown_caption = frame.caption.clone();
            renderer
                .window()
                .set_title(&window_title(self.shown_caption.as_deref()));
        }

        if let Some(camera) = self.playback.camera(renderer.aspect()) {
            renderer.update_globals(&camera, self.playback.scene());
        }
        if let Err(err) = renderer.render(self.playback.scene()) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = renderer.window().inner_size();
                    renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                other => {
                    warn!("Surface error ({other}); retrying next frame");
                }
            }
        }
        Ok(finished)
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.open(event_loop) {
            self.init_error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(true) => {
                    // Nothing moves after the last frame; only window events wake us.
                    event_loop.set_control_flow(ControlFlow::Wait);
                }
                Ok(false) => {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                Err(err) => {
                    error!("render failed: {err:#}");
                    self.last_error = Some(err);
                    event_loop.exit();
                }
            },
            _ => {}
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

const USAGE: &str = "Usage: miniature-chase [--summary-only] [--fps <n>] [--seed <n>]";

#[derive(Debug, PartialEq)]
struct CliOptions {
    summary_only: bool,
    fps: u32,
    seed: u64,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            summary_only: false,
            fps: DEFAULT_FPS,
            seed: DEFAULT_SEED,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--fps" => {
                    let value = args.next().ok_or_else(|| anyhow!("--fps needs a value. {USAGE}"))?;
                    options.fps = value
                        .parse()
                        .with_context(|| format!("invalid --fps value {value:?}"))?;
                    if options.fps == 0 {
                        return Err(anyhow!("--fps must be at least 1"));
                    }
                }
                "--seed" => {
                    let value = args.next().ok_or_else(|| anyhow!("--seed needs a value. {USAGE}"))?;
                    options.seed = value
                        .parse()
                        .with_context(|| format!("invalid --seed value {value:?}"))?;
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
