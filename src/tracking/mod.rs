//! Tracking module
//!
//! Landmark sources feeding the pose estimator:
//! - Live JSON-over-UDP packets from an external face landmark detector
//! - JSON-lines replay of a recorded session
//!
//! Both report at most one face per frame.

pub mod landmarks;
pub mod replay;
pub mod subprocess;
pub mod udp;

pub use landmarks::{
    FaceFeature, LandmarkLayout, LandmarkPoint, LandmarkSet, LandmarkVariant, Region,
};

use crate::error::TrackingError;
use crate::video::VideoFrame;

/// A face landmark detector as seen by the render loop.
pub trait LandmarkSource {
    /// Whether the detector can be queried yet
    fn is_ready(&self) -> bool;

    /// Landmarks for the given frame, or `None` when no face is visible.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, TrackingError>;
}

impl<T: LandmarkSource + ?Sized> LandmarkSource for Box<T> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, TrackingError> {
        (**self).detect(frame)
    }
}
