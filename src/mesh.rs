use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// GPU ready mesh buffers.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 6
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.vertices[index * 6..index * 6 + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.vertices[index * 6 + 3..index * 6 + 6])
    }

    fn push(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertex_count() as u32;
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z,
        ]);
        index
    }

    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.indices.extend_from_slice(&[a, b, d, b, c, d]);
    }
}

/// Procedural shapes the diorama is built from. All are centred on the
/// origin with Y up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    /// Rectangle in the XY plane facing +Z.
    Plane { width: f32, height: f32 },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Icosahedron { radius: f32, detail: u32 },
    Capsule {
        radius: f32,
        length: f32,
        cap_segments: u32,
        radial_segments: u32,
    },
}

impl Primitive {
    /// Stable key for caching GPU buffers of identical shapes.
    pub fn cache_key(&self) -> String {
        format!("{self:?}")
    }

    /// Radius of a sphere around the origin that contains the shape.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Primitive::Box {
                width,
                height,
                depth,
            } => Vec3::new(width, height, depth).length() * 0.5,
            Primitive::Plane { width, height } => (width * width + height * height).sqrt() * 0.5,
            Primitive::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => {
                let radius = radius_top.max(radius_bottom);
                (radius * radius + height * height * 0.25).sqrt()
            }
            Primitive::Sphere { radius, .. } | Primitive::Icosahedron { radius, .. } => radius,
            Primitive::Capsule { radius, length, .. } => radius + length * 0.5,
        }
    }

    pub fn build(&self) -> MeshData {
        match *self {
            Primitive::Box {
                width,
                height,
                depth,
            } => cuboid(width, height, depth),
            Primitive::Plane { width, height } => plane(width, height),
            Primitive::Cylinder {
                radius_top,
                radius_bottom,
                height,
                segments,
            } => cylinder(radius_top, radius_bottom, height, segments),
            Primitive::Sphere {
                radius,
                width_segments,
                height_segments,
            } => sphere(radius, width_segments, height_segments),
            Primitive::Icosahedron { radius, detail } => icosahedron(radius, detail),
            Primitive::Capsule {
                radius,
                length,
                cap_segments,
                radial_segments,
            } => capsule(radius, length, cap_segments, radial_segments),
        }
    }
}

pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let half = Vec3::new(width, height, depth) * 0.5;
    let mut mesh = MeshData::default();
    // (normal, u axis, v axis) per face; corners are n +/- u +/- v.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    for (normal, u, v) in faces {
        let corner = |su: f32, sv: f32| (normal + u * su + v * sv) * half;
        let a = mesh.push(corner(-1.0, -1.0), normal);
        let b = mesh.push(corner(1.0, -1.0), normal);
        let c = mesh.push(corner(1.0, 1.0), normal);
        let d = mesh.push(corner(-1.0, 1.0), normal);
        mesh.quad(a, b, c, d);
    }
    mesh
}

pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let mut mesh = MeshData::default();
    let a = mesh.push(Vec3::new(-hw, -hh, 0.0), Vec3::Z);
    let b = mesh.push(Vec3::new(hw, -hh, 0.0), Vec3::Z);
    let c = mesh.push(Vec3::new(hw, hh, 0.0), Vec3::Z);
    let d = mesh.push(Vec3::new(-hw, hh, 0.0), Vec3::Z);
    mesh.quad(a, b, c, d);
    mesh
}

pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = if height > 0.0 {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };
    let mut mesh = MeshData::default();

    let mut ring = Vec::with_capacity(segments as usize + 1);
    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(sin, slope, cos).normalize();
        let top = mesh.push(Vec3::new(radius_top * sin, half, radius_top * cos), normal);
        let bottom = mesh.push(
            Vec3::new(radius_bottom * sin, -half, radius_bottom * cos),
            normal,
        );
        ring.push((top, bottom));
    }
    for pair in ring.windows(2) {
        let (t0, b0) = pair[0];
        let (t1, b1) = pair[1];
        mesh.quad(b0, b1, t1, t0);
    }

    for (radius, y, normal) in [(radius_top, half, Vec3::Y), (radius_bottom, -half, Vec3::NEG_Y)] {
        if radius <= 0.0 {
            continue;
        }
        let center = mesh.push(Vec3::new(0.0, y, 0.0), normal);
        let first = mesh.vertex_count() as u32;
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * TAU;
            mesh.push(Vec3::new(radius * theta.sin(), y, radius * theta.cos()), normal);
        }
        for i in 0..segments {
            let (a, b) = (first + i, first + i + 1);
            if normal.y > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }
    mesh
}

pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = MeshData::default();
    let stride = width_segments + 1;
    for iy in 0..=height_segments {
        let phi = iy as f32 / height_segments as f32 * PI;
        for ix in 0..=width_segments {
            let theta = ix as f32 / width_segments as f32 * TAU;
            let normal = Vec3::new(-theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
            mesh.push(normal * radius, normal);
        }
    }
    lattice_indices(&mut mesh, height_segments, stride);
    mesh
}

pub fn capsule(radius: f32, length: f32, cap_segments: u32, radial_segments: u32) -> MeshData {
    let cap_segments = cap_segments.max(1);
    let radial_segments = radial_segments.max(3);
    let half = length * 0.5;
    let mut mesh = MeshData::default();
    let stride = radial_segments + 1;

    // Top cap down to the equator, then the equator again at the bottom cap.
    let mut rings = Vec::new();
    for i in 0..=cap_segments {
        rings.push((i as f32 / cap_segments as f32 * FRAC_PI_2, half));
    }
    for i in 0..=cap_segments {
        rings.push((FRAC_PI_2 + i as f32 / cap_segments as f32 * FRAC_PI_2, -half));
    }
    for &(phi, offset) in &rings {
        for ix in 0..=radial_segments {
            let theta = ix as f32 / radial_segments as f32 * TAU;
            let normal = Vec3::new(-theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
            mesh.push(normal * radius + Vec3::new(0.0, offset, 0.0), normal);
        }
    }
    lattice_indices(&mut mesh, rings.len() as u32 - 1, stride);
    mesh
}

/// Icosahedron, optionally subdivided. `detail == 0` is flat shaded.
pub fn icosahedron(radius: f32, detail: u32) -> MeshData {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let corners = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    const FACES: [[usize; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    let columns = detail + 1;
    let mut mesh = MeshData::default();
    for face in FACES {
        let [a, b, c] = face.map(|i| corners[i]);
        // Barycentric grid over the face, projected onto the sphere.
        let vertex = |i: u32, j: u32| {
            let (fi, fj) = (i as f32 / columns as f32, j as f32 / columns as f32);
            (a + (b - a) * fi + (c - a) * fj).normalize() * radius
        };
        for i in 0..columns {
            for j in 0..columns - i {
                let mut triangles = vec![[vertex(i, j), vertex(i + 1, j), vertex(i, j + 1)]];
                if i + j + 1 < columns {
                    triangles.push([vertex(i + 1, j), vertex(i + 1, j + 1), vertex(i, j + 1)]);
                }
                for [p0, p1, p2] in triangles {
                    let flat = (p1 - p0).cross(p2 - p0).normalize_or_zero();
                    for p in [p0, p1, p2] {
                        let normal = if detail == 0 {
                            flat
                        } else {
                            p.normalize_or_zero()
                        };
                        let index = mesh.push(p, normal);
                        mesh.indices.push(index);
                    }
                }
            }
        }
    }
    mesh
}

fn lattice_indices(mesh: &mut MeshData, rows: u32, stride: u32) {
    for iy in 0..rows {
        for ix in 0..stride - 1 {
            let a = iy * stride + ix;
            let b = a + 1;
            let c = a + stride + 1;
            let d = a + stride;
            mesh.indices.extend_from_slice(&[a, d, b, b, d, c]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_radius_contains_vertices() {
        let shapes = [
            Primitive::Box {
                width: 0.6,
                height: 0.25,
                depth: 0.35,
            },
            Primitive::Cylinder {
                radius_top: 0.2,
                radius_bottom: 0.05,
                height: 1.0,
                segments: 3,
            },
            Primitive::Capsule {
                radius: 0.08,
                length: 0.18,
                cap_segments: 8,
                radial_segments: 16,
            },
            Primitive::Icosahedron {
                radius: 1.0,
                detail: 1,
            },
        ];
        for shape in shapes {
            let mesh = shape.build();
            let radius = shape.bounding_radius() + 1e-4;
            assert!((0..mesh.vertex_count()).all(|i| mesh.position(i).length() <= radius));
        }
    }

    fn assert_unit_normals(mesh: &MeshData) {
        for i in 0..mesh.vertex_count() {
            assert!((mesh.normal(i).length() - 1.0).abs() < 1e-4, "vertex {i}");
        }
    }

    fn assert_indices_in_range(mesh: &MeshData) {
        assert_eq!(mesh.indices.len() % 3, 0);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn cuboid_has_six_faces() {
        let mesh = cuboid(0.6, 0.25, 0.35);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_unit_normals(&mesh);
        let max_x = (0..24).map(|i| mesh.position(i).x).fold(f32::MIN, f32::max);
        assert!((max_x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn cuboid_normals_point_outwards() {
        let mesh = cuboid(1.0, 1.0, 1.0);
        for i in 0..mesh.vertex_count() {
            assert!(mesh.position(i).dot(mesh.normal(i)) > 0.0);
        }
    }

    #[test]
    fn cylinder_radii_and_caps() {
        let mesh = cylinder(0.2, 0.05, 1.0, 3);
        assert_indices_in_range(&mesh);
        assert_unit_normals(&mesh);
        let top = mesh.position(0);
        assert!((Vec3::new(top.x, 0.0, top.z).length() - 0.2).abs() < 1e-6);
        assert!((top.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cone_skips_degenerate_cap() {
        let cone = cylinder(0.0, 0.5, 1.0, 8);
        let full = cylinder(0.5, 0.5, 1.0, 8);
        assert!(cone.vertex_count() < full.vertex_count());
    }

    #[test]
    fn sphere_vertices_on_radius() {
        let mesh = sphere(0.035, 16, 16);
        assert_indices_in_range(&mesh);
        assert_unit_normals(&mesh);
        for i in 0..mesh.vertex_count() {
            assert!((mesh.position(i).length() - 0.035).abs() < 1e-6);
        }
    }

    #[test]
    fn icosahedron_triangle_counts() {
        assert_eq!(icosahedron(1.0, 0).indices.len(), 20 * 3);
        assert_eq!(icosahedron(1.0, 1).indices.len(), 80 * 3);
        let mesh = icosahedron(0.35, 1);
        assert_unit_normals(&mesh);
        for i in 0..mesh.vertex_count() {
            assert!((mesh.position(i).length() - 0.35).abs() < 1e-5);
        }
    }

    #[test]
    fn flat_icosahedron_normals_face_outwards() {
        let mesh = icosahedron(1.0, 0);
        for i in 0..mesh.vertex_count() {
            assert!(mesh.position(i).dot(mesh.normal(i)) > 0.0);
        }
    }

    #[test]
    fn capsule_spans_length_plus_caps() {
        let mesh = capsule(0.08, 0.18, 8, 16);
        assert_indices_in_range(&mesh);
        assert_unit_normals(&mesh);
        let (low, high) = (0..mesh.vertex_count())
            .map(|i| mesh.position(i).y)
            .fold((f32::MAX, f32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
        assert!((high - 0.17).abs() < 1e-5);
        assert!((low + 0.17).abs() < 1e-5);
    }

    #[test]
    fn primitive_dispatch_matches_builders() {
        let primitive = Primitive::Box {
            width: 0.2,
            height: 0.1,
            depth: 0.38,
        };
        assert_eq!(primitive.build(), cuboid(0.2, 0.1, 0.38));
        assert_ne!(
            primitive.cache_key(),
            Primitive::Plane {
                width: 1.0,
                height: 1.0
            }
            .cache_key()
        );
    }
}
