//! Pose state shared by the 2D and 3D paths

use crate::config::RigConfig;
use crate::pose::{FacePose, PoseEstimator, PoseSmoother};
use crate::rig::{update_3d_nodes, ModelLoadStatus, ModelLoader, RigNodes, Scene3d};
use crate::tracking::LandmarkLayout;

/// Owns the smoothing state, the 3D scene and the model loader for one
/// run of the application.
pub struct PoseSession {
    estimator: PoseEstimator,
    smoother: PoseSmoother,
    loader: ModelLoader,
    scene: Option<Scene3d>,
    rig: Option<RigNodes>,
}

impl PoseSession {
    pub fn new(layout: &'static LandmarkLayout, config: &RigConfig) -> Self {
        Self {
            estimator: PoseEstimator::new(layout),
            smoother: PoseSmoother::new(config.smoothing),
            loader: ModelLoader::new(&config.model_path),
            scene: None,
            rig: None,
        }
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    pub fn smoother(&self) -> &PoseSmoother {
        &self.smoother
    }

    /// Create the scene on first use; later calls are no-ops.
    pub fn init_3d(&mut self, width: u32, height: u32) {
        if self.scene.is_none() {
            tracing::debug!("Initialising 3D scene ({}x{})", width, height);
            self.scene = Some(Scene3d::new(width, height));
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(scene) = self.scene.as_mut() {
            scene.set_size(width, height);
        }
    }

    pub fn scene(&self) -> Option<&Scene3d> {
        self.scene.as_ref()
    }

    pub fn rig(&self) -> Option<&RigNodes> {
        self.rig.as_ref()
    }

    /// Ensure the scene exists and start the model load if it never
    /// started. Returns whether a load was started.
    pub fn request_model(&mut self, width: u32, height: u32) -> bool {
        self.init_3d(width, height);
        self.loader.request()
    }

    pub fn load_status(&self) -> &ModelLoadStatus {
        self.loader.status()
    }

    pub fn loads_started(&self) -> usize {
        self.loader.loads_started()
    }

    /// Place a finished model into the scene. Returns the new load status
    /// when it changed on this call.
    pub fn poll_model(&mut self) -> Option<&ModelLoadStatus> {
        let before = self.loader.status().clone();
        if let Some(model) = self.loader.poll() {
            let scene = self.scene.get_or_insert_with(|| Scene3d::new(640, 480));
            let root = scene.add_model(&model);
            self.rig = Some(RigNodes::resolve(scene, root));
        }
        let after = self.loader.status();
        (*after != before).then_some(after)
    }

    pub fn is_model_ready(&self) -> bool {
        self.rig.is_some()
    }

    /// Replace the smoothing target with a newer detection
    pub fn set_target(&mut self, pose: FacePose) {
        self.smoother.set_target(pose);
    }

    /// Step the smoother and write the result onto the rig. Does nothing
    /// until both a pose and the model are available.
    pub fn update_3d_nodes(&mut self) -> bool {
        let (Some(scene), Some(rig)) = (self.scene.as_mut(), self.rig.as_ref()) else {
            return false;
        };
        match self.smoother.step() {
            Some(pose) => {
                update_3d_nodes(scene, rig, pose);
                true
            }
            None => false,
        }
    }
}
