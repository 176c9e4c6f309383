//! Rig driving and background model loading

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use super::model::HeadModel;
use super::scene::{RotationOrder, Scene3d};
use crate::error::RigError;
use crate::pose::FacePose;

/// Jaw rotation about X at `jaw_open == 1`, radians
pub const JAW_ROTATION: f32 = 0.6;

/// Handles to the posable nodes of the placed model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RigNodes {
    pub head: Option<usize>,
    pub jaw: Option<usize>,
    pub left_eye: Option<usize>,
    pub right_eye: Option<usize>,
}

impl RigNodes {
    /// Resolve the rig by node name below `root`. A model without a `Head`
    /// node is turned as a whole.
    pub fn resolve(scene: &Scene3d, root: usize) -> Self {
        let nodes = Self {
            head: scene.find_node(root, "Head").or(Some(root)),
            jaw: scene.find_node(root, "Jaw"),
            left_eye: scene.find_node(root, "LeftEye"),
            right_eye: scene.find_node(root, "RightEye"),
        };
        tracing::debug!(
            "Rig resolved: head={:?} jaw={:?} left_eye={:?} right_eye={:?}",
            nodes.head,
            nodes.jaw,
            nodes.left_eye,
            nodes.right_eye
        );
        nodes
    }
}

/// Write a smoothed pose onto the rig. Only rotations change.
pub fn update_3d_nodes(scene: &mut Scene3d, rig: &RigNodes, pose: &FacePose) {
    if let Some(head) = rig.head.and_then(|i| scene.node_mut(i)) {
        head.rotation.order = RotationOrder::Yxz;
        head.rotation.y = pose.head_yaw;
        head.rotation.x = pose.head_pitch;
        head.rotation.z = pose.head_roll;
    }
    if let Some(jaw) = rig.jaw.and_then(|i| scene.node_mut(i)) {
        jaw.rotation.x = pose.jaw_open * JAW_ROTATION;
    }
    for eye in [rig.left_eye, rig.right_eye] {
        if let Some(eye) = eye.and_then(|i| scene.node_mut(i)) {
            eye.rotation.order = RotationOrder::Yxz;
            eye.rotation.y = pose.eye_yaw;
            eye.rotation.x = pose.eye_pitch;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadStatus {
    NotStarted,
    Loading,
    Ready,
    Failed(String),
}

/// Loads the head model on a worker thread, at most once per session.
pub struct ModelLoader {
    path: PathBuf,
    status: ModelLoadStatus,
    result_rx: Option<Receiver<Result<HeadModel, RigError>>>,
    loads_started: usize,
}

impl ModelLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            status: ModelLoadStatus::NotStarted,
            result_rx: None,
            loads_started: 0,
        }
    }

    pub fn status(&self) -> &ModelLoadStatus {
        &self.status
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of loads ever started; never exceeds one.
    pub fn loads_started(&self) -> usize {
        self.loads_started
    }

    /// Start loading unless a load is in flight or already finished.
    /// Returns whether a load was started by this call.
    pub fn request(&mut self) -> bool {
        if self.status != ModelLoadStatus::NotStarted {
            return false;
        }

        let (result_tx, result_rx) = bounded(1);
        let path = self.path.clone();
        let spawned = thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || {
                let _ = result_tx.send(HeadModel::load(&path));
            });

        self.loads_started += 1;
        match spawned {
            Ok(_) => {
                tracing::info!("Loading 3D model from {}", self.path.display());
                self.status = ModelLoadStatus::Loading;
                self.result_rx = Some(result_rx);
            }
            Err(e) => {
                let message = format!("Failed to spawn model loader: {}", e);
                tracing::error!("{}", message);
                self.status = ModelLoadStatus::Failed(message);
            }
        }
        true
    }

    /// Pick up a finished load without blocking. Returns the model exactly
    /// once, on the call that observes completion.
    pub fn poll(&mut self) -> Option<HeadModel> {
        let rx = self.result_rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(RigError::LoaderDisconnected),
        };
        self.result_rx = None;

        match result {
            Ok(model) => {
                self.status = ModelLoadStatus::Ready;
                Some(model)
            }
            Err(e) => {
                tracing::error!("3D model load failed: {}", e);
                self.status = ModelLoadStatus::Failed(e.to_string());
                None
            }
        }
    }

    /// Block until the in-flight load finishes
    #[cfg(test)]
    pub(crate) fn wait(&mut self) -> Option<HeadModel> {
        let rx = self.result_rx.take()?;
        let result = rx.recv().unwrap_or(Err(RigError::LoaderDisconnected));
        match result {
            Ok(model) => {
                self.status = ModelLoadStatus::Ready;
                Some(model)
            }
            Err(e) => {
                self.status = ModelLoadStatus::Failed(e.to_string());
                None
            }
        }
    }
}
