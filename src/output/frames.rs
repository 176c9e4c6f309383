//! PNG sink for composited 2D frames

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::{OutputError, WatchdogError};

/// Writes every redrawn canvas as `frame_NNNNN.png`
#[derive(Debug)]
pub struct FrameSink {
    dir: PathBuf,
    written: u64,
}

impl FrameSink {
    /// Create the output directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, WatchdogError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| OutputError::FrameWrite {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::info!("Writing composited frames to {}", dir.display());
        Ok(Self { dir, written: 0 })
    }

    /// Path the next frame will be written to
    pub fn next_path(&self) -> PathBuf {
        self.dir.join(format!("frame_{:05}.png", self.written))
    }

    pub fn write(&mut self, image: &RgbaImage) -> Result<PathBuf, WatchdogError> {
        let path = self.next_path();
        image.save(&path).map_err(|e| OutputError::FrameWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.written += 1;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_numbered_frames() {
        let dir = TempDir::new().unwrap();
        let mut sink = FrameSink::new(dir.path().join("out")).unwrap();
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));

        let first = sink.write(&image).unwrap();
        let second = sink.write(&image).unwrap();
        assert_eq!(first.file_name().unwrap(), "frame_00000.png");
        assert_eq!(second.file_name().unwrap(), "frame_00001.png");
        assert_eq!(sink.frames_written(), 2);

        let back = image::open(&second).unwrap().to_rgba8();
        assert_eq!(back, image);
    }

    #[test]
    fn test_unwritable_dir() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = FrameSink::new(blocker.join("sub")).unwrap_err();
        assert!(matches!(
            err,
            WatchdogError::Output(OutputError::FrameWrite { .. })
        ));
    }
}
