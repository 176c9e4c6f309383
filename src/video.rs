//! Video frame input.
//!
//! Webcam capture is left to an external tool; frames arrive as numbered
//! image files in a directory. In replay mode the sequence advances one
//! frame per render tick. In follow mode the newest file is presented, so a
//! capture process writing into the directory drives the loop live.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::VideoConfig;
use crate::error::{TrackingError, WatchdogError};

/// A decoded video frame with its presentation timestamp.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
    /// Sequence number of the frame in its source
    pub index: u64,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
}

impl VideoFrame {
    pub fn new(image: RgbaImage, index: u64, timestamp: f64) -> Self {
        Self {
            image,
            index,
            timestamp,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Frames with no pixels are treated as "video not ready yet"
    pub fn has_size(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// Something that can present the current video frame.
pub trait FrameSource {
    /// Advance (if applicable) and return the frame to show this tick.
    fn current_frame(&mut self) -> Result<Option<&VideoFrame>, WatchdogError>;
}

/// Frames read from a directory of PNG/JPEG files sorted by name.
pub struct ImageSequence {
    dir: PathBuf,
    fps: f64,
    follow: bool,
    loop_frames: bool,
    files: Vec<PathBuf>,
    /// Index of the next file to decode in replay mode
    cursor: usize,
    current: Option<VideoFrame>,
    /// Follow mode: the file behind `current`, and how many frames have
    /// been presented so far
    presented: Option<FrameStamp>,
    presented_count: u64,
}

/// Identity of a frame file on disk
#[derive(Debug, Clone, PartialEq)]
struct FrameStamp {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl FrameStamp {
    fn of(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        }
    }
}

impl ImageSequence {
    /// Open a frame directory. The directory must exist; it may be empty in
    /// follow mode.
    pub fn open(config: &VideoConfig) -> Result<Self, WatchdogError> {
        if !config.frames_dir.is_dir() {
            return Err(TrackingError::Video(format!(
                "Frame directory not found: {}",
                config.frames_dir.display()
            ))
            .into());
        }

        let files = list_frames(&config.frames_dir)?;
        if files.is_empty() && !config.follow {
            return Err(TrackingError::Video(format!(
                "No image frames in {}",
                config.frames_dir.display()
            ))
            .into());
        }

        tracing::info!(
            "Video source: {} ({} frames, {})",
            config.frames_dir.display(),
            files.len(),
            if config.follow { "follow" } else { "replay" }
        );

        Ok(Self {
            dir: config.frames_dir.clone(),
            fps: config.fps,
            follow: config.follow,
            loop_frames: config.loop_frames,
            files,
            cursor: 0,
            current: None,
            presented: None,
            presented_count: 0,
        })
    }

    /// Number of frames known so far
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn decode(&self, index: usize) -> Result<VideoFrame, WatchdogError> {
        let image = decode_file(&self.files[index])?;
        Ok(VideoFrame::new(
            image,
            index as u64,
            index as f64 / self.fps,
        ))
    }

    fn advance_replay(&mut self) -> Result<(), WatchdogError> {
        if self.cursor >= self.files.len() {
            if !self.loop_frames || self.files.is_empty() {
                // Hold the last frame; its timestamp no longer advances.
                return Ok(());
            }
            self.cursor = 0;
        }
        let frame = self.decode(self.cursor)?;
        self.current = Some(frame);
        self.cursor += 1;
        Ok(())
    }

    /// Present the newest file if it differs from the one shown. Only a
    /// missing or unreadable directory is an error; a file that does not
    /// decode (usually still being written) is retried on the next call.
    fn advance_follow(&mut self) -> Result<(), WatchdogError> {
        self.files = list_frames(&self.dir)?;
        let Some(newest) = self.files.last() else {
            return Ok(());
        };
        let stamp = FrameStamp::of(newest);
        if self.presented.as_ref() == Some(&stamp) {
            return Ok(());
        }

        match decode_file(newest) {
            Ok(image) => {
                let index = self.presented_count;
                self.presented_count += 1;
                self.current = Some(VideoFrame::new(image, index, index as f64 / self.fps));
                self.presented = Some(stamp);
            }
            Err(e) => {
                tracing::debug!("Skipping unreadable frame: {}", e);
            }
        }
        Ok(())
    }
}

impl FrameSource for ImageSequence {
    fn current_frame(&mut self) -> Result<Option<&VideoFrame>, WatchdogError> {
        if self.follow {
            self.advance_follow()?;
        } else {
            self.advance_replay()?;
        }
        Ok(self.current.as_ref())
    }
}

fn decode_file(path: &Path) -> Result<RgbaImage, WatchdogError> {
    let image = image::open(path)
        .map_err(|e| TrackingError::Video(format!("{}: {}", path.display(), e)))?;
    Ok(image.to_rgba8())
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, WatchdogError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_frame_file(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}
