//! Pose estimation and smoothing

pub mod estimator;
pub mod smoothing;

pub use estimator::{FacePose, HeadPose, PoseEstimator};
pub use smoothing::{lerp, PoseSmoother, SMOOTHING};
