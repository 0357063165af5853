//! The static miniature set, built once, plus the per-frame step that
//! writes computed poses back onto the animated nodes.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::director::FrameState;
use crate::mesh::Primitive;
use crate::path::{CatmullRomCurve, CurveError};
use crate::scene::{
    hex_color, srgb_to_linear, Bloom, DepthOfField, DirectionalLight, HemisphereLight, Lighting,
    Material, NodeId, PostProcessing, Scene, SceneNode, Transform, Vignette,
};

/// Nominal route of the dirt track on the ground.
pub const GROUND_ROUTE: [Vec3; 6] = [
    Vec3::new(-3.5, 0.0, 0.6),
    Vec3::new(-2.0, 0.0, 0.15),
    Vec3::new(-0.8, 0.0, -0.1),
    Vec3::new(0.8, 0.0, -0.15),
    Vec3::new(2.2, 0.0, 0.0),
    Vec3::new(3.6, 0.0, 0.4),
];

pub const GRASS_ATTEMPTS: usize = 1200;
pub const ROCK_COUNT: usize = 24;
pub const TREE_COUNT: usize = 8;
const TRACK_SEGMENTS: usize = 40;
const TRACK_WIDTH: f32 = 3.0;
const GRASS_CLEARANCE: f32 = 1.5;

/// Gentle bobbing used for the tree canopies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatMotion {
    pub speed: f32,
    pub rotation_intensity: f32,
    pub float_intensity: f32,
}

impl Default for FloatMotion {
    fn default() -> Self {
        Self {
            speed: 1.5,
            rotation_intensity: 0.1,
            float_intensity: 0.2,
        }
    }
}

impl FloatMotion {
    pub fn transform(&self, elapsed: f32, phase: f32) -> Transform {
        let s = (phase + elapsed) / 4.0 * self.speed;
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            s.cos() / 8.0 * self.rotation_intensity,
            s.sin() / 8.0 * self.rotation_intensity,
            s.sin() / 20.0 * self.rotation_intensity,
        );
        Transform::from_translation(Vec3::new(0.0, s.sin() / 10.0 * self.float_intensity, 0.0))
            .with_rotation(rotation)
    }
}

/// Nodes the per-frame step writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct DioramaHandles {
    pub jax: NodeId,
    pub jax_wheels: [NodeId; 2],
    pub jax_face: NodeId,
    pub nino: NodeId,
    pub nino_bag: NodeId,
    pub shadows: [NodeId; 2],
    /// Canopy groups with their float phase.
    pub canopies: Vec<(NodeId, f32)>,
    pub dust: Vec<NodeId>,
    pub float: FloatMotion,
}

impl DioramaHandles {
    /// Copies one frame's poses onto the scene graph.
    pub fn apply(&self, scene: &mut Scene, frame: &FrameState) {
        let primary = &frame.poses.primary;
        let secondary = &frame.poses.secondary;

        scene.set_transform(
            self.jax,
            Transform::from_translation(primary.body.position)
                .with_rotation(primary.body.orientation),
        );
        let wheel = wheel_rotation(primary.wheel_spin);
        for id in self.jax_wheels {
            scene.set_rotation(id, wheel);
        }
        scene.set_rotation(self.jax_face, Quat::from_rotation_y(primary.face_yaw));

        scene.set_transform(
            self.nino,
            Transform::from_translation(secondary.body.position)
                .with_rotation(secondary.body.orientation),
        );
        scene.set_rotation(self.nino_bag, Quat::from_rotation_z(secondary.bag_sway));

        for (id, anchor) in self.shadows.iter().zip([primary.body.position, secondary.body.position]) {
            scene.set_position(*id, Vec3::new(anchor.x, 0.002, anchor.z));
        }

        for &(id, phase) in &self.canopies {
            scene.set_transform(id, self.float.transform(frame.elapsed(), phase));
        }

        for (id, position) in self.dust.iter().zip(&frame.dust) {
            scene.set_position(*id, *position);
        }
    }
}

/// Axle along local Z; the cylinder's own axis is Y.
fn wheel_rotation(spin: f32) -> Quat {
    Quat::from_rotation_z(-spin) * Quat::from_rotation_x(FRAC_PI_2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diorama {
    pub scene: Scene,
    pub handles: DioramaHandles,
}

impl Diorama {
    /// Builds the whole set. `seed` fixes every scattered prop.
    pub fn build(seed: u64, dust_count: usize) -> Result<Self, CurveError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut scene = Scene::new(lighting(), post_processing());

        add_ground(&mut scene);
        add_track(&mut scene)?;
        add_grass(&mut scene, &mut rng);
        add_rocks(&mut scene, &mut rng);
        let canopies = add_trees(&mut scene, &mut rng);
        let (jax, jax_wheels, jax_face) = add_jax(&mut scene);
        let (nino, nino_bag) = add_nino(&mut scene);
        let shadows = add_shadows(&mut scene);
        let dust = add_dust(&mut scene, dust_count);

        Ok(Self {
            scene,
            handles: DioramaHandles {
                jax,
                jax_wheels,
                jax_face,
                nino,
                nino_bag,
                shadows,
                canopies,
                dust,
                float: FloatMotion::default(),
            },
        })
    }

    pub fn apply(&mut self, frame: &FrameState) {
        self.handles.apply(&mut self.scene, frame);
    }
}

pub fn lighting() -> Lighting {
    Lighting {
        background: hex_color(0x0b0d10),
        hemisphere: HemisphereLight {
            sky: hex_color(0xfff6e9),
            ground: hex_color(0x223344),
            intensity: 0.45,
        },
        sun: DirectionalLight {
            position: Vec3::new(2.8, 3.5, 2.5),
            color: hex_color(0xffe2b3),
            intensity: 2.2,
        },
    }
}

pub fn post_processing() -> PostProcessing {
    PostProcessing {
        tone_mapping: true,
        depth_of_field: Some(DepthOfField {
            focus_distance: 0.008,
            focal_length: 0.018,
            bokeh_scale: 2.2,
        }),
        bloom: Some(Bloom {
            intensity: 0.3,
            luminance_threshold: 0.6,
        }),
        vignette: Some(Vignette {
            darkness: 0.35,
            offset: 0.25,
        }),
    }
}

fn flat() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

fn add_ground(scene: &mut Scene) {
    scene.add(
        SceneNode::mesh(
            "ground",
            Primitive::Plane {
                width: 12.0,
                height: 8.0,
            },
            Material::new(hex_color(0x6f8b55), 1.0),
        )
        .with_transform(Transform::IDENTITY.with_rotation(flat())),
    );
}

/// Dirt strip laid as short flat slabs following the ground route.
fn add_track(scene: &mut Scene) -> Result<(), CurveError> {
    let route = CatmullRomCurve::centripetal(GROUND_ROUTE.to_vec())?;
    let group = scene.add(SceneNode::group("track").at(Vec3::new(0.0, 0.001, 0.0)));
    let material = Material::new(hex_color(0x7b5b3e), 1.0);
    let step = route.length() / TRACK_SEGMENTS as f32;
    for i in 0..TRACK_SEGMENTS {
        let u = (i as f32 + 0.5) / TRACK_SEGMENTS as f32;
        let heading = route.tangent_at(u);
        let flat_heading = Vec3::new(heading.x, 0.0, heading.z).try_normalize().unwrap_or(Vec3::X);
        let yaw = Quat::from_rotation_arc(Vec3::X, flat_heading);
        scene.add(
            SceneNode::mesh(
                format!("track-{i}"),
                Primitive::Box {
                    width: step * 1.05,
                    height: 0.002,
                    depth: TRACK_WIDTH,
                },
                material,
            )
            .with_parent(group)
            .with_transform(Transform::from_translation(route.point_at(u)).with_rotation(yaw)),
        );
    }
    Ok(())
}

fn add_grass(scene: &mut Scene, rng: &mut StdRng) {
    let group = scene.add(SceneNode::group("grass"));
    let blade = Primitive::Cylinder {
        radius_top: 0.2,
        radius_bottom: 0.05,
        height: 1.0,
        segments: 3,
    };
    for i in 0..GRASS_ATTEMPTS {
        let x: f32 = rng.random_range(-5.0..5.0);
        let z: f32 = rng.random_range(-3.0..3.0);
        let lean: f32 = rng.random_range(-0.15..0.15);
        let scale: f32 = rng.random_range(0.015..0.035);
        let hue: f32 = 0.33 + rng.random_range(-0.02..0.02);
        let lightness: f32 = rng.random_range(0.3..0.45);
        // Keep the track clear.
        if z.abs() < GRASS_CLEARANCE {
            continue;
        }
        let rotation = Quat::from_euler(EulerRot::XYZ, -FRAC_PI_2, 0.0, lean);
        scene.add(
            SceneNode::mesh(format!("grass-{i}"), blade, Material::new(hsl(hue, 0.6, lightness), 0.9))
                .with_parent(group)
                .with_transform(
                    Transform::from_translation(Vec3::new(x, 0.0, z))
                        .with_rotation(rotation)
                        .with_scale(Vec3::splat(scale)),
                ),
        );
    }
}

fn add_rocks(scene: &mut Scene, rng: &mut StdRng) {
    let group = scene.add(SceneNode::group("rocks"));
    let material = Material::new(hex_color(0x8e8f92), 0.95);
    for i in 0..ROCK_COUNT {
        let x: f32 = rng.random_range(-5.0..5.0);
        let z: f32 = rng.random_range(-3.0..3.0);
        let position = Vec3::new(x, 0.08, z);
        let scale: f32 = rng.random_range(0.08..0.22);
        scene.add(
            SceneNode::mesh(
                format!("rock-{i}"),
                Primitive::Icosahedron {
                    radius: 1.0,
                    detail: 1,
                },
                material,
            )
            .with_parent(group)
            .with_transform(Transform::from_translation(position).with_scale(Vec3::splat(scale))),
        );
    }
}

fn add_trees(scene: &mut Scene, rng: &mut StdRng) -> Vec<(NodeId, f32)> {
    let trunk_material = Material::new(hex_color(0x6b4f3b), 1.0);
    let leaf_material = Material::new(hex_color(0x2b5d38), 0.95);
    let mut canopies = Vec::with_capacity(TREE_COUNT);
    for i in 0..TREE_COUNT {
        let z = if i % 2 == 0 { -2.2 } else { 2.2 };
        let tree = scene.add(SceneNode::group(format!("tree-{i}")).at(Vec3::new(-3.5 + i as f32, 0.0, z)));
        scene.add(
            SceneNode::mesh(
                format!("tree-{i}-trunk"),
                Primitive::Cylinder {
                    radius_top: 0.05,
                    radius_bottom: 0.08,
                    height: 0.4,
                    segments: 6,
                },
                trunk_material,
            )
            .with_parent(tree)
            .at(Vec3::new(0.0, 0.1, 0.0)),
        );
        let canopy = scene.add(SceneNode::group(format!("tree-{i}-float")).with_parent(tree));
        scene.add(
            SceneNode::mesh(
                format!("tree-{i}-canopy"),
                Primitive::Icosahedron {
                    radius: 0.35,
                    detail: 0,
                },
                leaf_material,
            )
            .with_parent(canopy)
            .at(Vec3::new(0.0, 0.45, 0.0)),
        );
        let phase: f32 = rng.random_range(0.0..10_000.0);
        canopies.push((canopy, phase));
    }
    canopies
}

fn sphere(radius: f32, segments: u32) -> Primitive {
    Primitive::Sphere {
        radius,
        width_segments: segments,
        height_segments: segments,
    }
}

fn add_jax(scene: &mut Scene) -> (NodeId, [NodeId; 2], NodeId) {
    let root = scene.add(SceneNode::group("jax").at(crate::actors::PRIMARY_ROUTE[0]));
    let part = |name: &str, mesh: Primitive, material: Material, at: Vec3| {
        SceneNode::mesh(format!("jax-{name}"), mesh, material)
            .with_parent(root)
            .at(at)
    };

    scene.add(part(
        "body",
        Primitive::Box {
            width: 0.6,
            height: 0.25,
            depth: 0.35,
        },
        Material::new(hex_color(0xd3322b), 0.5).with_metalness(0.2),
        Vec3::new(0.0, 0.15, 0.0),
    ));
    scene.add(part(
        "bumper",
        Primitive::Box {
            width: 0.2,
            height: 0.1,
            depth: 0.38,
        },
        Material::new(hex_color(0x8a1f1a), 0.9),
        Vec3::new(0.25, 0.08, 0.0),
    ));

    let tyre = Primitive::Cylinder {
        radius_top: 0.09,
        radius_bottom: 0.09,
        height: 0.22,
        segments: 16,
    };
    let rubber = Material::new(hex_color(0x2b2b2b), 1.0);
    let mut wheels = [NodeId(0); 2];
    for (slot, (side, z)) in wheels.iter_mut().zip([("left", 0.18), ("right", -0.18)]) {
        let at = Transform::from_translation(Vec3::new(0.0, 0.07, z)).with_rotation(wheel_rotation(0.0));
        *slot = scene.add(part(&format!("{side}-wheel"), tyre, rubber, Vec3::ZERO).with_transform(at));
    }

    let head = scene.add(
        SceneNode::group("jax-head")
            .with_parent(root)
            .at(Vec3::new(0.18, 0.18, 0.0)),
    );
    let face = scene.add(
        SceneNode::mesh(
            "jax-face",
            Primitive::Box {
                width: 0.06,
                height: 0.06,
                depth: 0.28,
            },
            Material::new(hex_color(0xffdedb), 0.4),
        )
        .with_parent(head)
        .at(Vec3::new(0.08, 0.02, 0.0)),
    );
    let eye = Material::new(Vec3::ONE, 1.0).with_emissive(hex_color(0xffd8d6) * 0.15);
    let pupil = Material::new(hex_color(0x1b1b1b), 1.0);
    for z in [0.09, -0.09] {
        scene.add(
            SceneNode::mesh("jax-eye", sphere(0.035, 16), eye)
                .with_parent(head)
                .at(Vec3::new(0.1, 0.02, z)),
        );
        scene.add(
            SceneNode::mesh("jax-pupil", sphere(0.015, 12), pupil)
                .with_parent(head)
                .at(Vec3::new(0.13, 0.02, z)),
        );
    }
    (root, wheels, face)
}

fn add_nino(scene: &mut Scene) -> (NodeId, NodeId) {
    let root = scene.add(SceneNode::group("nino").at(Vec3::new(-3.6, 0.12, 0.02)));
    let add = |scene: &mut Scene, name: &str, mesh: Primitive, material: Material, at: Vec3| {
        scene.add(
            SceneNode::mesh(format!("nino-{name}"), mesh, material)
                .with_parent(root)
                .at(at),
        )
    };

    add(
        scene,
        "body",
        Primitive::Capsule {
            radius: 0.08,
            length: 0.18,
            cap_segments: 8,
            radial_segments: 16,
        },
        Material::new(hex_color(0x3a87d6), 0.5),
        Vec3::new(0.0, 0.14, 0.0),
    );
    let white = Material::new(hex_color(0xfefefe), 1.0);
    let antenna = Material::new(hex_color(0xb7d9ff), 0.8);
    let arm = Material::new(hex_color(0x9dc3f0), 1.0);
    let rod = |radius: f32, height: f32| Primitive::Cylinder {
        radius_top: radius,
        radius_bottom: radius,
        height,
        segments: 8,
    };
    for z in [0.03, -0.03] {
        add(scene, "eye", sphere(0.015, 12), white, Vec3::new(0.07, 0.18, z));
    }
    add(scene, "antenna", rod(0.006, 0.08), antenna, Vec3::new(0.0, 0.28, 0.0));
    add(scene, "antenna-tip", sphere(0.012, 12), antenna, Vec3::new(0.0, 0.325, 0.0));
    for z in [0.07, -0.07] {
        add(scene, "arm", rod(0.01, 0.14), arm, Vec3::new(-0.05, 0.15, z));
    }
    let bag = add(
        scene,
        "bag",
        Primitive::Box {
            width: 0.12,
            height: 0.08,
            depth: 0.06,
        },
        Material::new(hex_color(0xe2b04a), 0.8),
        Vec3::new(-0.05, 0.1, 0.12),
    );
    (root, bag)
}

fn add_shadows(scene: &mut Scene) -> [NodeId; 2] {
    let disc = Primitive::Cylinder {
        radius_top: 0.3,
        radius_bottom: 0.3,
        height: 0.001,
        segments: 24,
    };
    let shade = Material::new(Vec3::ZERO, 1.0).with_opacity(0.35);
    [
        scene.add(SceneNode::mesh("jax-shadow", disc, shade)),
        scene.add(SceneNode::mesh("nino-shadow", disc, shade)),
    ]
}

fn add_dust(scene: &mut Scene, count: usize) -> Vec<NodeId> {
    let group = scene.add(SceneNode::group("dust"));
    let material = Material::new(hex_color(0xcbb192), 1.0).with_opacity(0.7);
    (0..count)
        .map(|i| {
            scene.add(
                SceneNode::mesh(format!("dust-{i}"), sphere(0.01, 6), material).with_parent(group),
            )
        })
        .collect()
}

/// HSL in `[0, 1]` (sRGB) to linear RGB.
pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Vec3 {
    if saturation <= 0.0 {
        return Vec3::splat(srgb_to_linear(lightness));
    }
    let p = if lightness <= 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let q = 2.0 * lightness - p;
    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        let value = if t < 1.0 / 6.0 {
            q + (p - q) * 6.0 * t
        } else if t < 0.5 {
            p
        } else if t < 2.0 / 3.0 {
            q + (p - q) * 6.0 * (2.0 / 3.0 - t)
        } else {
            q
        };
        srgb_to_linear(value)
    };
    Vec3::new(channel(hue + 1.0 / 3.0), channel(hue), channel(hue - 1.0 / 3.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::Director;

    fn build() -> Diorama {
        Diorama::build(7, 80).unwrap()
    }

    #[test]
    fn grass_avoids_the_track() {
        let diorama = build();
        let blades: Vec<_> = diorama
            .scene
            .nodes
            .iter()
            .filter(|node| node.name.starts_with("grass-"))
            .collect();
        assert!(!blades.is_empty() && blades.len() < GRASS_ATTEMPTS);
        assert!(blades
            .iter()
            .all(|node| node.transform.translation.z.abs() >= GRASS_CLEARANCE));
    }

    #[test]
    fn same_seed_builds_same_set() {
        assert_eq!(build(), build());
        assert_ne!(build().scene, Diorama::build(8, 80).unwrap().scene);
    }

    #[test]
    fn props_are_counted() {
        let scene = build().scene;
        let count = |prefix: &str| scene.nodes.iter().filter(|n| n.name.starts_with(prefix)).count();
        assert_eq!(count("rock-"), ROCK_COUNT);
        assert_eq!(count("tree-"), TREE_COUNT * 4);
        assert_eq!(count("dust-"), 80);
        assert_eq!(count("track-"), TRACK_SEGMENTS);
    }

    #[test]
    fn track_follows_ground_route() {
        let scene = build().scene;
        let first = scene.find("track-0").unwrap();
        let start = scene.world_matrix(first).transform_point3(Vec3::ZERO);
        assert!(start.x < -3.0 && (start.z - 0.55).abs() < 0.2);
    }

    #[test]
    fn apply_moves_actors_and_parts() {
        let mut diorama = build();
        let mut director = Director::scripted(7).unwrap();
        director.advance(0.0);
        let frame = director.advance(4.0);
        diorama.apply(&frame);

        let scene = &diorama.scene;
        let jax = scene.world_matrix(diorama.handles.jax).transform_point3(Vec3::ZERO);
        assert!(jax.distance(frame.poses.primary.body.position) < 1e-5);
        let nino = scene.world_matrix(diorama.handles.nino).transform_point3(Vec3::ZERO);
        assert!(nino.distance(frame.poses.secondary.body.position) < 1e-5);

        let bag = scene.node(diorama.handles.nino_bag).unwrap();
        assert_eq!(bag.transform.rotation, Quat::from_rotation_z(frame.poses.secondary.bag_sway));
        let shadow = scene.node(diorama.handles.shadows[0]).unwrap();
        assert!((shadow.transform.translation.x - jax.x).abs() < 1e-5);
        let dust = scene.node(diorama.handles.dust[0]).unwrap();
        assert_eq!(dust.transform.translation, frame.dust[0]);
    }

    #[test]
    fn wheels_keep_axle_across_body() {
        for spin in [0.0, 1.3, 32.0] {
            let axle = wheel_rotation(spin) * Vec3::Y;
            assert!(axle.distance(Vec3::Z) < 1e-5 || axle.distance(Vec3::NEG_Z) < 1e-5);
        }
    }

    #[test]
    fn canopy_float_is_small() {
        let motion = FloatMotion::default();
        for step in 0..40 {
            let transform = motion.transform(step as f32 * 0.2, 123.0);
            assert!(transform.translation.y.abs() <= 0.02 + 1e-6);
            assert!(transform.rotation.angle_between(Quat::IDENTITY) < 0.05);
        }
    }

    #[test]
    fn hsl_grass_is_green() {
        let color = hsl(0.33, 0.6, 0.4);
        assert!(color.y > color.x && color.y > color.z);
        assert!(hsl(0.0, 0.0, 1.0).distance(Vec3::ONE) < 1e-6);
    }
}
