use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::mesh::Primitive;

/// Index of a node inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Runtime representation of the diorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub lighting: Lighting,
    pub post: PostProcessing,
}

impl Scene {
    pub fn new(lighting: Lighting, post: PostProcessing) -> Self {
        Self {
            nodes: Vec::new(),
            lighting,
            post,
        }
    }

    /// Adds a node and returns its id. Parents must be added first.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        debug_assert!(node.parent.map_or(true, |parent| parent.0 < self.nodes.len()));
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        self.update(id, |node| node.transform = transform).is_some()
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> bool {
        self.update(id, |node| node.transform.translation = position)
            .is_some()
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> bool {
        self.update(id, |node| node.transform.rotation = rotation)
            .is_some()
    }

    /// Applies a mutation to the requested node.
    pub fn update<F, R>(&mut self, id: NodeId, updater: F) -> Option<R>
    where
        F: FnOnce(&mut SceneNode) -> R,
    {
        self.nodes.get_mut(id.0).map(updater)
    }

    /// Composes the node's transform with all of its ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(NodeId(index)) = current {
            let Some(node) = self.nodes.get(index) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// World matrices for every node, in node order.
    ///
    /// Parents always precede their children, so one forward pass suffices.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut matrices: Vec<Mat4> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let local = node.transform.matrix();
            let world = match node.parent {
                Some(NodeId(parent)) if parent < matrices.len() => matrices[parent] * local,
                _ => local,
            };
            matrices.push(world);
        }
        matrices
    }

    /// Nodes that carry geometry, with their world matrices.
    pub fn drawables(&self) -> impl Iterator<Item = (NodeId, &SceneNode, Mat4)> + '_ {
        let matrices = self.world_matrices();
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.mesh.is_some() && node.visible)
            .map(move |(index, node)| (NodeId(index), node, matrices[index]))
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.mesh.is_some()).count()
    }
}

/// Scene node: a transform, an optional mesh and a parent link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Primitive>,
    #[serde(default)]
    pub material: Material,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl SceneNode {
    /// A node without geometry, used to group children.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            mesh: None,
            material: Material::default(),
            transform: Transform::default(),
            visible: true,
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: Primitive, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            material,
            ..Self::group(name)
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.transform.translation = position;
        self
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Physically based surface description, in linear RGB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Vec3,
    pub roughness: f32,
    pub metalness: f32,
    pub emissive: Vec3,
    pub opacity: f32,
}

impl Material {
    pub fn new(color: Vec3, roughness: f32) -> Self {
        Self {
            color,
            roughness,
            ..Self::default()
        }
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            roughness: 1.0,
            metalness: 0.0,
            emissive: Vec3::ZERO,
            opacity: 1.0,
        }
    }
}

/// Converts a `#rrggbb` colour from sRGB to linear RGB.
pub fn hex_color(hex: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.0031308 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HemisphereLight {
    pub sky: Vec3,
    pub ground: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Light position; it shines towards the origin.
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub background: Vec3,
    pub hemisphere: HemisphereLight,
    pub sun: DirectionalLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            background: Vec3::ZERO,
            hemisphere: HemisphereLight {
                sky: Vec3::ONE,
                ground: Vec3::ZERO,
                intensity: 0.5,
            },
            sun: DirectionalLight {
                position: Vec3::new(3.0, 5.0, 3.0),
                color: Vec3::ONE,
                intensity: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthOfField {
    /// Normalised focus distance in `[0, 1]` of the depth range.
    pub focus_distance: f32,
    pub focal_length: f32,
    pub bokeh_scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bloom {
    pub intensity: f32,
    pub luminance_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vignette {
    pub darkness: f32,
    pub offset: f32,
}

/// Post-processing stack, applied in field order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PostProcessing {
    pub tone_mapping: bool,
    pub depth_of_field: Option<DepthOfField>,
    pub bloom: Option<Bloom>,
    pub vignette: Option<Vignette>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Primitive {
        Primitive::Box {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
        }
    }

    #[test]
    fn child_inherits_parent_transform() {
        let mut scene = Scene::default();
        let parent = scene.add(SceneNode::group("parent").at(Vec3::new(1.0, 0.0, 0.0)));
        let child = scene.add(
            SceneNode::mesh("child", cube(), Material::default())
                .with_parent(parent)
                .at(Vec3::new(0.0, 2.0, 0.0)),
        );
        let world = scene.world_matrix(child);
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(scene.world_matrices()[child.0], world);
    }

    #[test]
    fn parent_rotation_moves_child() {
        let mut scene = Scene::default();
        let parent = scene.add(SceneNode::group("parent").with_transform(
            Transform::IDENTITY.with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
        ));
        let child = scene.add(SceneNode::group("child").with_parent(parent).at(Vec3::X));
        let p = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!(p.distance(Vec3::new(0.0, 0.0, -1.0)) < 1e-6);
    }

    #[test]
    fn update_returns_none_for_missing_node() {
        let mut scene = Scene::default();
        assert!(!scene.set_position(NodeId(3), Vec3::ONE));
    }

    #[test]
    fn drawables_skip_groups_and_hidden_nodes() {
        let mut scene = Scene::default();
        scene.add(SceneNode::group("group"));
        scene.add(SceneNode::mesh("shown", cube(), Material::default()));
        let hidden = scene.add(SceneNode::mesh("hidden", cube(), Material::default()));
        scene.update(hidden, |node| node.visible = false);
        let names: Vec<&str> = scene.drawables().map(|(_, node, _)| node.name.as_str()).collect();
        assert_eq!(names, vec!["shown"]);
        assert_eq!(scene.find("hidden"), Some(hidden));
    }

    #[test]
    fn hex_color_is_linear() {
        assert!(hex_color(0xffffff).distance(Vec3::ONE) < 1e-6);
        assert_eq!(hex_color(0x000000), Vec3::ZERO);
        let mid = hex_color(0x808080);
        assert!((mid.x - 0.2158605).abs() < 1e-4);
        assert!((linear_to_srgb(mid.x) - 128.0 / 255.0).abs() < 1e-4);
    }
}
