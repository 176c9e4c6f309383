//! Watchdog Avatar - face-tracked avatar overlay
//!
//! Drives a cartoon avatar from a webcam feed:
//! - Face landmarks from an external detector (live UDP or recorded replay)
//! - 2D mode: the avatar image with the user's own eyes and mouth pasted in
//! - 3D mode: a glTF head whose Head/Jaw/Eye nodes follow the face pose

pub mod app;
pub mod avatar;
pub mod config;
pub mod error;
pub mod output;
pub mod pose;
pub mod rig;
pub mod tracking;
pub mod video;

pub use config::Config;
pub use error::{Result, WatchdogError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
