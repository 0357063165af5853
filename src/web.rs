#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, HtmlCanvasElement, Performance};

use crate::app::{window_title, FrameLoop, Playback, PlaybackConfig, DEFAULT_SEED};
use crate::render::Renderer;

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub struct WasmApp {
    inner: Rc<RefCell<AppState>>,
    frame_loop: SharedLoop,
}

#[wasm_bindgen]
impl WasmApp {
    /// Binds the diorama to `<canvas id=canvas_id>`. Captions also go to
    /// the `#dialogue` element when the page has one.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: String, seed: Option<u32>) -> Result<WasmApp, JsValue> {
        let window = window().ok_or_else(|| JsValue::from_str("window not available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("document not available"))?;
        let performance = window
            .performance()
            .ok_or_else(|| JsValue::from_str("performance timer not available"))?;
        let canvas = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| JsValue::from_str("canvas element not found"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("element is not a canvas"))?;

        let config = PlaybackConfig {
            seed: seed.map_or(DEFAULT_SEED, u64::from),
            ..PlaybackConfig::default()
        };
        let playback = Playback::new(&config).map_err(|err| JsValue::from_str(&err.to_string()))?;
        let mut renderer = Renderer::new(canvas.clone(), playback.scene())
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        renderer.resize((canvas.client_width().max(1) as u32, canvas.client_height().max(1) as u32));
        document.set_title(&window_title(None));

        let state = AppState {
            renderer,
            playback,
            dialogue: document.get_element_by_id("dialogue"),
            document,
            performance,
            shown_caption: None,
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(state)),
            frame_loop: SharedLoop::default(),
        })
    }

    /// Starts the animation loop. It stops requesting frames once the
    /// timeline has finished. Does nothing while a loop is running.
    pub fn start(&self) -> Result<(), JsValue> {
        schedule_animation_loop(Rc::clone(&self.inner), &self.frame_loop)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Cancels the pending frame and releases the loop.
    pub fn stop(&self) {
        stop_loop(&self.frame_loop);
    }

    pub fn running(&self) -> bool {
        self.frame_loop.borrow().is_running()
    }

    pub fn elapsed(&self) -> f32 {
        self.inner
            .borrow()
            .playback
            .last_frame()
            .map_or(0.0, |frame| frame.elapsed())
    }

    pub fn finished(&self) -> bool {
        self.inner.borrow().playback.is_finished()
    }
}

impl Drop for WasmApp {
    fn drop(&mut self) {
        stop_loop(&self.frame_loop);
    }
}

struct AppState {
    renderer: Renderer,
    playback: Playback,
    document: Document,
    dialogue: Option<Element>,
    performance: Performance,
    shown_caption: Option<String>,
}

impl AppState {
    /// Draws one frame and reports whether the timeline has finished.
    fn render_frame(&mut self) -> Result<bool> {
        let now = self.performance.now() / 1000.0;
        let frame = self.playback.step(now);
        let finished = frame.finished();
        let caption = frame.caption.clone();

        if let Some(camera) = self.playback.camera(self.renderer.aspect()) {
            self.renderer.update_globals(&camera, self.playback.scene());
        }
        self.renderer
            .render(self.playback.scene(), caption.as_deref())
            .map_err(|err| {
                let message = err
                    .as_string()
                    .unwrap_or_else(|| "unknown canvas error".to_string());
                anyhow!("render failed: {message}")
            })?;

        if caption != self.shown_caption {
            if let Some(dialogue) = &self.dialogue {
                dialogue.set_text_content(caption.as_deref());
            }
            self.document.set_title(&window_title(caption.as_deref()));
            self.shown_caption = caption;
        }
        Ok(finished)
    }
}

type SharedLoop = Rc<RefCell<FrameLoop<Closure<dyn FnMut()>>>>;

fn request_frame(frame_loop: &SharedLoop) -> Result<()> {
    let window = window().ok_or_else(|| anyhow!("window not available"))?;
    let mut state = frame_loop.borrow_mut();
    let closure = state
        .callback()
        .ok_or_else(|| anyhow!("animation loop stopped"))?;
    let handle = window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("requestAnimationFrame failed: {err:?}"))?;
    state.requested(handle);
    Ok(())
}

fn stop_loop(frame_loop: &SharedLoop) {
    let (pending, callback) = frame_loop.borrow_mut().stop();
    if let (Some(handle), Some(window)) = (pending, window()) {
        if let Err(err) = window.cancel_animation_frame(handle) {
            web_sys::console::error_1(&err);
        }
    }
    drop(callback);
}

fn schedule_animation_loop(app: Rc<RefCell<AppState>>, frame_loop: &SharedLoop) -> Result<()> {
    let next = Rc::clone(frame_loop);
    let callback = Closure::wrap(Box::new(move || {
        next.borrow_mut().fired();
        let finished = match app.borrow_mut().render_frame() {
            Ok(finished) => finished,
            Err(err) => {
                web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
                true
            }
        };
        if finished {
            // Breaks the self-reference so the closure can be freed.
            stop_loop(&next);
        } else if let Err(err) = request_frame(&next) {
            web_sys::console::error_1(&JsValue::from_str(&err.to_string()));
        }
    }) as Box<dyn FnMut()>);

    if !frame_loop.borrow_mut().install(callback) {
        return Ok(());
    }
    request_frame(frame_loop)
}
