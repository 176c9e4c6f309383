//! glTF/GLB head model loading using the `gltf` crate.
//!
//! Only the node hierarchy is kept: names, parents and rest transforms.
//! Meshes and materials are left to whatever renderer consumes the scene.

use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};

use crate::error::RigError;

/// Name given to the model root when the glTF scene is unnamed
pub const DEFAULT_ROOT_NAME: &str = "Scene";

/// One node of the loaded model, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    /// Empty when the node is unnamed
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// A loaded head model
#[derive(Debug, Clone)]
pub struct HeadModel {
    /// Name of the glTF scene, used for the model root
    pub name: String,
    pub nodes: Vec<ModelNode>,
    pub source: PathBuf,
}

impl HeadModel {
    /// Load a `.glb` or `.gltf` file and extract its node graph.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RigError> {
        let path = path.as_ref();
        let (document, _buffers, _images) = gltf::import(path)
            .map_err(|e| RigError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let mut model = Self::from_document(&document);
        model.source = path.to_path_buf();

        tracing::info!(
            "Loaded model {} ({} nodes)",
            path.display(),
            model.nodes.len()
        );
        Ok(model)
    }

    fn from_document(document: &gltf::Document) -> Self {
        let node_count = document.nodes().count();
        let mut parents = vec![None; node_count];
        for node in document.nodes() {
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }

        let nodes = document
            .nodes()
            .map(|node| {
                let (t, r, s) = node.transform().decomposed();
                ModelNode {
                    name: node.name().unwrap_or_default().to_string(),
                    parent: parents[node.index()],
                    translation: Vec3::from(t),
                    rotation: Quat::from_array(r),
                    scale: Vec3::from(s),
                }
            })
            .collect();

        let name = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .and_then(|scene| scene.name().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());

        Self {
            name,
            nodes,
            source: PathBuf::new(),
        }
    }

    /// Index of the first node with the given name
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
