//! 3D scene graph driven by the rig.

use glam::{EulerRot, Quat, Vec3};
use serde::Serialize;

use super::model::HeadModel;

pub const BACKGROUND_COLOR: u32 = 0x1a1a1a;

/// Order in which the three Euler angles are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RotationOrder {
    #[default]
    #[serde(rename = "XYZ")]
    Xyz,
    #[serde(rename = "YXZ")]
    Yxz,
}

/// Euler rotation in radians. Matrices compose in the named order, so
/// `Yxz` is `Ry * Rx * Rz`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NodeRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub order: RotationOrder,
}

impl NodeRotation {
    /// Decompose a quaternion into the default order
    pub fn from_quat(q: Quat) -> Self {
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        Self {
            x,
            y,
            z,
            order: RotationOrder::Xyz,
        }
    }

    pub fn quat(&self) -> Quat {
        match self.order {
            RotationOrder::Xyz => Quat::from_euler(EulerRot::XYZ, self.x, self.y, self.z),
            RotationOrder::Yxz => Quat::from_euler(EulerRot::YXZ, self.y, self.x, self.z),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: NodeRotation,
    pub scale: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view, degrees
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: u32,
    pub intensity: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: u32,
    pub intensity: f32,
}

/// Camera, lights and the placed model
#[derive(Debug, Clone)]
pub struct Scene3d {
    pub background: u32,
    pub camera: PerspectiveCamera,
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
    nodes: Vec<SceneNode>,
    model_root: Option<usize>,
}

impl Scene3d {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            background: BACKGROUND_COLOR,
            camera: PerspectiveCamera {
                fov: 40.0,
                aspect: aspect(width, height),
                near: 0.1,
                far: 100.0,
                position: Vec3::new(0.0, 0.0, 2.2),
                target: Vec3::ZERO,
            },
            directional: DirectionalLight {
                color: 0xffffff,
                intensity: 1.0,
                position: Vec3::new(0.5, 0.5, 1.0),
            },
            ambient: AmbientLight {
                color: 0xffffff,
                intensity: 0.6,
            },
            nodes: Vec::new(),
            model_root: None,
        }
    }

    /// Track a new frame size
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.camera.aspect = aspect(width, height);
    }

    /// Place a loaded model under a new root node at the origin with
    /// identity rotation and unit scale. Returns the root's index.
    pub fn add_model(&mut self, model: &HeadModel) -> usize {
        let root = self.nodes.len();
        self.nodes.push(SceneNode {
            name: model.name.clone(),
            parent: None,
            translation: Vec3::ZERO,
            rotation: NodeRotation::default(),
            scale: Vec3::ONE,
        });

        let offset = root + 1;
        for node in &model.nodes {
            self.nodes.push(SceneNode {
                name: node.name.clone(),
                parent: Some(node.parent.map_or(root, |p| p + offset)),
                translation: node.translation,
                rotation: NodeRotation::from_quat(node.rotation),
                scale: node.scale,
            });
        }

        self.model_root = Some(root);
        root
    }

    pub fn model_root(&self) -> Option<usize> {
        self.model_root
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut SceneNode> {
        self.nodes.get_mut(index)
    }

    /// First node with `name` at or below `root`, depth-first in insertion
    /// order.
    pub fn find_node(&self, root: usize, name: &str) -> Option<usize> {
        (root..self.nodes.len()).find(|&i| self.nodes[i].name == name && self.is_under(i, root))
    }

    fn is_under(&self, mut index: usize, root: usize) -> bool {
        loop {
            if index == root {
                return true;
            }
            match self.nodes.get(index).and_then(|n| n.parent) {
                Some(parent) => index = parent,
                None => return false,
            }
        }
    }

    /// Accumulated rotation from the scene root down to `index`
    pub fn world_rotation(&self, index: usize) -> Quat {
        let mut q = Quat::IDENTITY;
        let mut current = Some(index);
        while let Some(i) = current {
            let Some(node) = self.nodes.get(i) else {
                break;
            };
            q = node.rotation.quat() * q;
            current = node.parent;
        }
        q
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::model::tests::{write_gltf, HEAD_GLTF};
    use tempfile::TempDir;

    fn head_model() -> HeadModel {
        let dir = TempDir::new().unwrap();
        let path = write_gltf(&dir, "head.gltf", HEAD_GLTF);
        HeadModel::load(path).unwrap()
    }

    #[test]
    fn test_scene_defaults() {
        let scene = Scene3d::new(640, 480);
        assert_eq!(scene.background, 0x1a1a1a);
        assert_eq!(scene.camera.fov, 40.0);
        assert!((scene.camera.aspect - 640.0 / 480.0).abs() < 1e-6);
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 2.2));
        assert_eq!(scene.directional.intensity, 1.0);
        assert_eq!(scene.ambient.intensity, 0.6);
        assert!(scene.model_root().is_none());
    }

    #[test]
    fn test_set_size_updates_aspect() {
        let mut scene = Scene3d::new(640, 480);
        scene.set_size(1920, 1080);
        assert!((scene.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_yxz_order_matches_composition() {
        let rotation = NodeRotation {
            x: 0.3,
            y: -0.5,
            z: 0.2,
            order: RotationOrder::Yxz,
        };
        let expected =
            Quat::from_rotation_y(-0.5) * Quat::from_rotation_x(0.3) * Quat::from_rotation_z(0.2);
        assert!(rotation.quat().angle_between(expected) < 1e-5);

        // Same angles in the default order give a different rotation.
        let xyz = NodeRotation {
            order: RotationOrder::Xyz,
            ..rotation
        };
        assert!(xyz.quat().angle_between(expected) > 1e-3);
    }

    #[test]
    fn test_from_quat_roundtrip() {
        let q = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let r = NodeRotation::from_quat(q);
        assert_eq!(r.order, RotationOrder::Xyz);
        assert!(r.quat().angle_between(q) < 1e-5);
    }

    #[test]
    fn test_add_model_under_root() {
        let mut scene = Scene3d::new(640, 480);
        let root = scene.add_model(&head_model());
        assert_eq!(scene.model_root(), Some(root));
        assert_eq!(scene.nodes().len(), 5);

        let root_node = scene.node(root).unwrap();
        assert_eq!(root_node.name, "WatchdogHead");
        assert_eq!(root_node.translation, Vec3::ZERO);
        assert_eq!(root_node.scale, Vec3::ONE);

        let head = scene.find_node(root, "Head").unwrap();
        let jaw = scene.find_node(root, "Jaw").unwrap();
        assert_eq!(scene.node(head).unwrap().parent, Some(root));
        assert_eq!(scene.node(jaw).unwrap().parent, Some(head));
        assert!(scene.find_node(root, "Tail").is_none());
    }

    #[test]
    fn test_world_rotation_accumulates() {
        let mut scene = Scene3d::new(640, 480);
        let root = scene.add_model(&head_model());
        let head = scene.find_node(root, "Head").unwrap();
        let jaw = scene.find_node(root, "Jaw").unwrap();

        scene.node_mut(head).unwrap().rotation = NodeRotation {
            y: 0.4,
            ..NodeRotation::default()
        };
        scene.node_mut(jaw).unwrap().rotation.x = 0.3;

        let expected = Quat::from_rotation_y(0.4) * Quat::from_rotation_x(0.3);
        assert!(scene.world_rotation(jaw).angle_between(expected) < 1e-5);
    }
}
