//! User-facing status line

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    LoadingModel,
    StartingVideo,
    Ready,
    FaceTracked,
    NoFace,
    Loading3d,
    LoadError3d(String),
    Error(String),
}

impl Status {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::LoadError3d(_) | Self::Error(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadingModel => write!(f, "Loading model…"),
            Self::StartingVideo => write!(f, "Starting video…"),
            Self::Ready => write!(f, "Ready – look at the camera"),
            Self::FaceTracked => write!(f, "Face tracked"),
            Self::NoFace => write!(f, "No face – look at the camera"),
            Self::Loading3d => write!(f, "Loading 3D model…"),
            Self::LoadError3d(msg) => write!(f, "3D load error: {}", msg),
            Self::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Holds the current status and logs each change once.
#[derive(Debug, Default)]
pub struct StatusBoard {
    current: Option<Status>,
    changes: u64,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the status changed
    pub fn set(&mut self, status: Status) -> bool {
        if self.current.as_ref() == Some(&status) {
            return false;
        }
        if status.is_error() {
            tracing::warn!("Status: {}", status);
        } else {
            tracing::info!("Status: {}", status);
        }
        self.current = Some(status);
        self.changes += 1;
        true
    }

    pub fn current(&self) -> Option<&Status> {
        self.current.as_ref()
    }

    /// Number of distinct transitions so far
    pub fn changes(&self) -> u64 {
        self.changes
    }
}
