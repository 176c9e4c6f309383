//! Error types for Watchdog Avatar

use thiserror::Error;

/// Main error type for Watchdog Avatar
#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Rig error: {0}")]
    Rig(#[from] RigError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Landmark source and video input errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Landmark receiver error: {0}")]
    Receiver(String),

    #[error("Landmark parse error: {0}")]
    Parse(String),

    #[error("Replay file error: {0}")]
    Replay(String),

    #[error("Detector subprocess error: {0}")]
    Subprocess(String),

    #[error("Video source error: {0}")]
    Video(String),
}

/// 2D avatar errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),
}

/// 3D model and rig errors
#[derive(Error, Debug)]
pub enum RigError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model loader stopped before delivering a result")]
    LoaderDisconnected,

    #[error("Render failed: {0}")]
    Render(String),
}

/// Output sink errors
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write frame {path}: {message}")]
    FrameWrite { path: String, message: String },

    #[error("Failed to write scene snapshot: {0}")]
    SceneLog(String),
}

/// Result type alias for Watchdog Avatar operations
pub type Result<T> = std::result::Result<T, WatchdogError>;
