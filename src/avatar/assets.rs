//! Avatar image loading

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::config::AvatarConfig;
use crate::error::{AvatarError, WatchdogError};

/// The avatar base image, if one could be loaded
#[derive(Debug, Default)]
pub struct AvatarAssets {
    /// Where the image was looked up
    source: Option<PathBuf>,
    image: Option<RgbaImage>,
}

impl AvatarAssets {
    /// Load the configured avatar image. Never fails: a missing or broken
    /// file is logged and the placeholder is used for the whole session.
    pub fn load(config: &AvatarConfig) -> Self {
        let path = resolve(&config.image_path);
        match Self::try_load(&path) {
            Ok(image) => {
                tracing::info!(
                    "Loaded avatar image {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                Self {
                    source: Some(path),
                    image: Some(image),
                }
            }
            Err(e) => {
                tracing::warn!("Using placeholder avatar: {}", e);
                Self {
                    source: Some(path),
                    image: None,
                }
            }
        }
    }

    /// No image; the procedural placeholder is drawn
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            source: None,
            image: Some(image),
        }
    }

    pub fn try_load(path: &Path) -> Result<RgbaImage, WatchdogError> {
        if !path.exists() {
            return Err(AvatarError::AssetNotFound(path.display().to_string()).into());
        }
        let image = image::open(path)
            .map_err(|e| AvatarError::ImageLoad(format!("{}: {}", path.display(), e)))?;
        Ok(image.to_rgba8())
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether a real image (not the placeholder) is in use
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn test_load_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("avatar.png");
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let config = AvatarConfig {
            image_path: path.clone(),
            ..AvatarConfig::default()
        };
        let assets = AvatarAssets::load(&config);
        assert!(assets.has_image());
        assert_eq!(assets.image().unwrap().dimensions(), (8, 4));
        assert_eq!(assets.source(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = AvatarConfig {
            image_path: dir.path().join("nope.png"),
            ..AvatarConfig::default()
        };
        let assets = AvatarAssets::load(&config);
        assert!(!assets.has_image());

        let err = AvatarAssets::try_load(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, WatchdogError::Avatar(AvatarError::AssetNotFound(_))));
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = AvatarAssets::try_load(&path).unwrap_err();
        assert!(matches!(err, WatchdogError::Avatar(AvatarError::ImageLoad(_))));

        let config = AvatarConfig {
            image_path: path,
            ..AvatarConfig::default()
        };
        assert!(!AvatarAssets::load(&config).has_image());
    }
}
