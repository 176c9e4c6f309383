//! Landmark points, index layouts and derived regions.
//!
//! Two detector families are supported. Their index semantics differ, so the
//! pose and compositing code never touches raw indices: it asks a
//! [`LandmarkLayout`] for named points instead.

use serde::{Deserialize, Serialize};

/// Padding applied to region width/height.
pub const REGION_PADDING: f32 = 1.8;

/// Extent substituted for a zero-width or zero-height region.
const DEGENERATE_EXTENT: f32 = 0.1;

/// A single tracked point in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &LandmarkPoint) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// One face worth of landmarks, in detector order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    /// Build a set from raw `[x, y]` pairs as a detector reports them.
    ///
    /// With `image_size` the pairs are pixel coordinates: they are divided by
    /// the frame size and truncated to the variant's point count, and a short
    /// list yields `None`. Without it the pairs are taken as already
    /// normalized.
    pub fn from_raw(
        raw: &[[f32; 2]],
        image_size: Option<[f32; 2]>,
        variant: LandmarkVariant,
    ) -> Option<Self> {
        match image_size {
            Some([w, h]) => {
                let count = variant.point_count();
                if raw.len() < count || w <= 0.0 || h <= 0.0 {
                    return None;
                }
                let points = raw[..count]
                    .iter()
                    .map(|[x, y]| LandmarkPoint::new(x / w, y / h))
                    .collect();
                Some(Self::new(points))
            }
            None => Some(Self::new(
                raw.iter().map(|[x, y]| LandmarkPoint::new(*x, *y)).collect(),
            )),
        }
    }

    pub fn get(&self, index: usize) -> Option<LandmarkPoint> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPoint> {
        self.points.iter()
    }

    /// Padded bounding box over the given indices. Indices past the end of
    /// the set are skipped; `None` when none of them resolve.
    pub fn region(&self, indices: &[usize]) -> Option<Region> {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        let mut found = false;

        for p in indices.iter().filter_map(|&i| self.get(i)) {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
            found = true;
        }

        if !found {
            return None;
        }

        let mut width = max_x - min_x;
        if width == 0.0 {
            width = DEGENERATE_EXTENT;
        }
        let mut height = max_y - min_y;
        if height == 0.0 {
            height = DEGENERATE_EXTENT;
        }

        Some(Region {
            x: min_x,
            y: min_y,
            width: width * REGION_PADDING,
            height: height * REGION_PADDING,
            center_x: (min_x + max_x) / 2.0,
            center_y: (min_y + max_y) / 2.0,
        })
    }
}

/// Axis-aligned box derived from a subset of landmarks, padded by
/// [`REGION_PADDING`]. Normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub center_x: f32,
    pub center_y: f32,
}

/// Facial features that are cropped from video onto the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceFeature {
    LeftEye,
    RightEye,
    Mouth,
}

impl FaceFeature {
    pub const ALL: [FaceFeature; 3] = [Self::LeftEye, Self::RightEye, Self::Mouth];
}

/// Which detector produced the landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LandmarkVariant {
    /// Dense face mesh with iris points (478 landmarks)
    #[default]
    #[serde(rename = "face_mesh_478", alias = "mediapipe")]
    FaceMesh478,
    /// Classic 68-point face landmark model
    #[serde(rename = "face_68", alias = "dlib")]
    Face68,
}

impl LandmarkVariant {
    pub fn layout(&self) -> &'static LandmarkLayout {
        match self {
            Self::FaceMesh478 => &FACE_MESH_478,
            Self::Face68 => &FACE_68,
        }
    }

    pub fn point_count(&self) -> usize {
        self.layout().point_count
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FaceMesh478 => "face_mesh_478",
            Self::Face68 => "face_68",
        }
    }
}

/// Semantic index table for one detector variant.
#[derive(Debug, PartialEq, Eq)]
pub struct LandmarkLayout {
    pub variant: LandmarkVariant,
    /// Number of points a complete detection carries
    pub point_count: usize,
    pub nose: usize,
    /// Used when `nose` is missing from a short set
    pub nose_fallback: Option<usize>,
    pub left_eye_outer: usize,
    pub right_eye_outer: usize,
    pub upper_lip: usize,
    pub lower_lip: usize,
    pub left_eye_region: &'static [usize],
    pub right_eye_region: &'static [usize],
    pub mouth_region: &'static [usize],
}

pub static FACE_MESH_478: LandmarkLayout = LandmarkLayout {
    variant: LandmarkVariant::FaceMesh478,
    point_count: 478,
    nose: 4,
    nose_fallback: Some(1),
    left_eye_outer: 33,
    right_eye_outer: 263,
    upper_lip: 13,
    lower_lip: 14,
    left_eye_region: &[33, 160, 158, 133, 153, 144],
    right_eye_region: &[362, 385, 387, 263, 373, 380],
    mouth_region: &[61, 291, 0, 17, 78, 308, 324, 318],
};

pub static FACE_68: LandmarkLayout = LandmarkLayout {
    variant: LandmarkVariant::Face68,
    point_count: 68,
    nose: 30,
    nose_fallback: None,
    left_eye_outer: 36,
    right_eye_outer: 45,
    upper_lip: 51,
    lower_lip: 57,
    left_eye_region: &[36, 37, 38, 39, 40, 41],
    right_eye_region: &[42, 43, 44, 45, 46, 47],
    mouth_region: &[48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59],
};

impl LandmarkLayout {
    pub fn nose(&self, set: &LandmarkSet) -> Option<LandmarkPoint> {
        set.get(self.nose)
            .or_else(|| self.nose_fallback.and_then(|i| set.get(i)))
    }

    pub fn left_eye(&self, set: &LandmarkSet) -> Option<LandmarkPoint> {
        set.get(self.left_eye_outer)
    }

    pub fn right_eye(&self, set: &LandmarkSet) -> Option<LandmarkPoint> {
        set.get(self.right_eye_outer)
    }

    pub fn upper_lip(&self, set: &LandmarkSet) -> Option<LandmarkPoint> {
        set.get(self.upper_lip)
    }

    pub fn lower_lip(&self, set: &LandmarkSet) -> Option<LandmarkPoint> {
        set.get(self.lower_lip)
    }

    pub fn region_indices(&self, feature: FaceFeature) -> &'static [usize] {
        match feature {
            FaceFeature::LeftEye => self.left_eye_region,
            FaceFeature::RightEye => self.right_eye_region,
            FaceFeature::Mouth => self.mouth_region,
        }
    }

    /// Whether a set is long enough for region cropping
    pub fn is_complete(&self, set: &LandmarkSet) -> bool {
        set.len() >= self.point_count
    }
}
