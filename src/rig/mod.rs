//! 3D rig module
//!
//! Loads the head model, places it in a small scene and writes the smoothed
//! face pose onto its named nodes.

pub mod driver;
pub mod model;
pub mod renderer;
pub mod scene;

pub use driver::{update_3d_nodes, ModelLoadStatus, ModelLoader, RigNodes};
pub use model::HeadModel;
pub use renderer::{SceneRenderer, SnapshotRenderer};
pub use scene::{NodeRotation, RotationOrder, Scene3d};
