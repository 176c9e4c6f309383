//! Output module
//!
//! Sinks for rendered results:
//! - PNG frames for the 2D composite
//! - JSON-lines scene snapshots for 3D (see [`crate::rig::SnapshotRenderer`])

pub mod frames;

pub use frames::FrameSink;
