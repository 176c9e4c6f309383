//! Configuration parsing and management for Watchdog Avatar

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, WatchdogError};
use crate::tracking::LandmarkVariant;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub video: VideoConfig,
    pub display: DisplayConfig,
    pub avatar: AvatarConfig,
    pub rig: RigConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WatchdogError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, WatchdogError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, WatchdogError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), WatchdogError> {
        if self.tracking.source == LandmarkSourceKind::Udp && self.tracking.port == 0 {
            return Err(invalid("tracking.port", "Port must be greater than 0"));
        }

        if self.tracking.source == LandmarkSourceKind::Replay
            && self.tracking.replay_path.is_none()
        {
            return Err(ConfigError::MissingField("tracking.replay_path".to_string()).into());
        }

        if !(self.video.fps > 0.0) {
            return Err(invalid("video.fps", "Frame rate must be greater than 0"));
        }

        if self.display.fps == 0 {
            return Err(invalid("display.fps", "Render rate must be greater than 0"));
        }

        if !(self.avatar.scale > 0.0) {
            return Err(invalid("avatar.scale", "Scale must be greater than 0"));
        }

        if !(self.rig.smoothing > 0.0 && self.rig.smoothing <= 1.0) {
            return Err(invalid("rig.smoothing", "Smoothing must be in (0.0, 1.0]"));
        }

        if self.tracking.auto_launch {
            let path = Path::new(&self.tracking.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Detector auto_launch enabled but tracker script not found at: {}",
                    self.tracking.tracker_script
                );
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> WatchdogError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Where landmarks come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkSourceKind {
    /// Live JSON-over-UDP packets from an external detector helper
    #[default]
    Udp,
    /// Pre-recorded JSON lines keyed by frame index
    Replay,
}

/// Landmark detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Landmark source: "udp" or "replay"
    pub source: LandmarkSourceKind,
    /// Index layout of the active detector
    pub variant: LandmarkVariant,
    /// UDP listen address
    pub listen_address: String,
    /// UDP listen port
    pub port: u16,
    /// JSON-lines replay file (replay source only)
    pub replay_path: Option<PathBuf>,
    /// Launch the detector helper as a child process
    pub auto_launch: bool,
    /// Path to the detector helper script
    pub tracker_script: String,
    /// Camera device index passed to the detector helper
    pub camera_device: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            source: LandmarkSourceKind::Udp,
            variant: LandmarkVariant::FaceMesh478,
            listen_address: "127.0.0.1".to_string(),
            port: 12347,
            replay_path: None,
            auto_launch: false,
            tracker_script: "scripts/face_landmarker.py".to_string(),
            camera_device: 0,
        }
    }
}

/// Video frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Directory of numbered image frames
    pub frames_dir: PathBuf,
    /// Present the newest frame on every tick instead of stepping through
    pub follow: bool,
    /// Restart from the first frame after the last one (replay only)
    pub loop_frames: bool,
    /// Frames per second used to derive presentation timestamps
    pub fps: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            follow: false,
            loop_frames: false,
            fps: 30.0,
        }
    }
}

/// Render loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render loop rate in Hz
    pub fps: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}

/// Rendering path selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Composite live eye/mouth crops onto a flat avatar image
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    /// Drive a rigged glTF model
    #[serde(rename = "3d")]
    ThreeD,
}

impl std::str::FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "2d" | "two_d" | "composite" => Ok(Self::TwoD),
            "3d" | "three_d" | "rig" => Ok(Self::ThreeD),
            other => Err(ConfigError::InvalidValue {
                field: "mode".to_string(),
                message: format!("Unknown render mode '{}' (expected 2d or 3d)", other),
            }),
        }
    }
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoD => "2d",
            Self::ThreeD => "3d",
        }
    }
}

/// 2D avatar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Avatar base image; a procedural placeholder is drawn when missing
    pub image_path: PathBuf,
    /// User scale multiplier applied on top of the tracked head scale
    pub scale: f32,
    /// Draw every landmark as a small circle
    pub show_debug: bool,
    /// Initial rendering mode
    pub mode: RenderMode,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("assets/watchdog.png"),
            scale: 1.0,
            show_debug: false,
            mode: RenderMode::TwoD,
        }
    }
}

/// 3D rig configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Path to the GLB/glTF head model
    pub model_path: PathBuf,
    /// Interpolation factor applied every render tick
    pub smoothing: f32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/watchdog_head.glb"),
            smoothing: crate::pose::SMOOTHING,
        }
    }
}

/// Output sinks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving composited 2D frames as PNG
    pub frames_dir: Option<PathBuf>,
    /// JSON-lines file receiving one scene snapshot per 3D render
    pub scene_log: Option<PathBuf>,
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("watchdog-avatar");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/watchdog-avatar");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/watchdog-avatar");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("watchdog-avatar");
        }
    }

    PathBuf::from(".")
}
