use std::f64::consts::TAU;

use anyhow::{anyhow, Result};
use glam::Vec3;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::common::{css_color, CameraParams};
use crate::scene::Scene;

/// Fallback renderer for WebAssembly builds: every mesh node is projected
/// and painted back to front as a flat disc on a 2D canvas.
pub struct Renderer {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    size: (u32, u32),
    camera: Option<CameraParams>,
    background: String,
}

impl Renderer {
    /// Creates a renderer that draws into the provided HTML canvas element.
    pub fn new(canvas: HtmlCanvasElement, scene: &Scene) -> Result<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|err| anyhow!("failed to query canvas context: {err:?}"))?
            .ok_or_else(|| anyhow!("canvas does not support 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| anyhow!("failed to cast canvas context"))?;

        let size = (canvas.width(), canvas.height());
        Ok(Self {
            canvas,
            context,
            size,
            camera: None,
            background: css_color(scene.lighting.background, 1.0),
        })
    }

    pub fn aspect(&self) -> f32 {
        self.size.0 as f32 / self.size.1.max(1) as f32
    }

    /// Updates the canvas dimensions to match the browser layout.
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 == 0 || new_size.1 == 0 {
            return;
        }
        self.size = new_size;
        self.canvas.set_width(new_size.0);
        self.canvas.set_height(new_size.1);
    }

    pub fn update_globals(&mut self, camera: &CameraParams, _scene: &Scene) {
        self.camera = Some(*camera);
    }

    pub fn render(&mut self, scene: &Scene, caption: Option<&str>) -> Result<(), wasm_bindgen::JsValue> {
        self.context.set_global_alpha(1.0);
        self.context.set_fill_style(&self.background.as_str().into());
        self.context
            .fill_rect(0.0, 0.0, self.size.0 as f64, self.size.1 as f64);

        let Some(camera) = self.camera else {
            return Ok(());
        };
        let width = self.size.0 as f64;
        let height = self.size.1 as f64;

        let mut discs = Vec::new();
        for (_, node, world) in scene.drawables() {
            let Some(mesh) = node.mesh else { continue };
            let centre = world.transform_point3(Vec3::ZERO);
            let (scale, _, _) = world.to_scale_rotation_translation();
            let radius = mesh.bounding_radius() * scale.max_element();
            let (Some((x, y, depth)), Some((ex, ey, _))) = (
                camera.project(centre),
                camera.project(centre + Vec3::Y * radius),
            ) else {
                continue;
            };
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }
            let to_screen = |x: f32, y: f32| {
                (
                    (x as f64 * 0.5 + 0.5) * width,
                    (0.5 - y as f64 * 0.5) * height,
                )
            };
            let (sx, sy) = to_screen(x, y);
            let (tx, ty) = to_screen(ex, ey);
            let pixels = ((tx - sx).powi(2) + (ty - sy).powi(2)).sqrt().max(0.5);
            let lit = node.material.color * 0.85 + node.material.emissive;
            discs.push((depth, sx, sy, pixels, css_color(lit, node.material.opacity)));
        }
        discs.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (_, x, y, radius, color) in discs {
            self.context.set_fill_style(&color.into());
            self.context.begin_path();
            self.context.arc(x, y, radius, 0.0, TAU)?;
            self.context.fill();
        }

        if let Some(text) = caption {
            self.context.set_font("16px sans-serif");
            self.context.set_fill_style(&"rgba(0, 0, 0, 0.55)".into());
            self.context
                .fill_rect(0.0, height - 48.0, width, 48.0);
            self.context.set_fill_style(&"white".into());
            self.context.fill_text(text, 16.0, height - 18.0)?;
        }

        Ok(())
    }
}
