//! Recorded landmark replay
//!
//! One JSON object per line, keyed by the video frame index:
//!
//! ```text
//! {"frame": 0, "landmarks": [[0.51, 0.47], ...]}
//! {"frame": 1, "landmarks": null}
//! {"frame": 2, "landmarks": [[330.0, 220.0], ...], "image_size": [640, 480]}
//! ```
//!
//! Frames with no line, or with `null` landmarks, have no face.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{TrackingError, WatchdogError};
use crate::tracking::{LandmarkSet, LandmarkSource, LandmarkVariant};
use crate::video::VideoFrame;

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    frame: u64,
    #[serde(default)]
    landmarks: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    image_size: Option<[f32; 2]>,
}

/// Landmark source backed by a recorded JSON-lines file
#[derive(Debug, Default)]
pub struct ReplayLandmarkSource {
    frames: HashMap<u64, LandmarkSet>,
}

impl ReplayLandmarkSource {
    /// Load a replay file
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        variant: LandmarkVariant,
    ) -> Result<Self, WatchdogError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            TrackingError::Replay(format!("{}: {}", path.display(), e))
        })?;
        let source = Self::from_reader(std::io::BufReader::new(file), variant)?;
        tracing::info!(
            "Loaded landmark replay {} ({} frames with a face)",
            path.display(),
            source.frames.len()
        );
        Ok(source)
    }

    /// Parse replay records from any buffered reader
    pub fn from_reader<R: BufRead>(
        reader: R,
        variant: LandmarkVariant,
    ) -> Result<Self, WatchdogError> {
        let mut frames = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: ReplayRecord = serde_json::from_str(line).map_err(|e| {
                TrackingError::Replay(format!("line {}: {}", line_no + 1, e))
            })?;

            let set = record
                .landmarks
                .as_deref()
                .filter(|raw| !raw.is_empty())
                .and_then(|raw| LandmarkSet::from_raw(raw, record.image_size, variant));

            match set {
                Some(set) => {
                    frames.insert(record.frame, set);
                }
                None => {
                    frames.remove(&record.frame);
                }
            }
        }

        Ok(Self { frames })
    }

    /// Number of frames that carry a face
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkSource for ReplayLandmarkSource {
    fn is_ready(&self) -> bool {
        true
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, TrackingError> {
        Ok(self.frames.get(&frame.index).cloned())
    }
}
