use glam::{Mat4, Vec3};

use crate::scene::linear_to_srgb;

/// Camera parameters consumed by the renderer's uniform buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl CameraParams {
    /// Projects a world position to normalised device coordinates and the
    /// clip-space depth. Returns `None` behind the camera.
    pub fn project(&self, point: Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_proj * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        Some((clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
    }
}

/// CSS `rgba()` string for a linear colour.
pub fn css_color(color: Vec3, alpha: f32) -> String {
    let channel = |value: f32| (linear_to_srgb(value.clamp(0.0, 1.0)) * 255.0).round() as u8;
    format!(
        "rgba({}, {}, {}, {:.2})",
        channel(color.x),
        channel(color.y),
        channel(color.z),
        alpha.clamp(0.0, 1.0)
    )
}
