//! Heuristic head pose from sparse landmarks.
//!
//! No solver is involved: the nose position stands in for yaw/pitch, the
//! eye line for roll, and the lip gap for jaw opening. Both detector
//! variants go through the same formulas; the layout picks the points.

use serde::Serialize;

use crate::tracking::{LandmarkLayout, LandmarkSet};

/// Inter-eye distance used when the two eye points coincide
pub const FALLBACK_EYE_DISTANCE: f32 = 0.2;

const YAW_GAIN: f32 = 1.2;
const PITCH_GAIN: f32 = 1.0;
const JAW_GAIN: f32 = 8.0;
const EYE_YAW_FRACTION: f32 = 0.8;
const EYE_PITCH_FRACTION: f32 = 0.6;

/// 2D placement of the avatar head, in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    /// Degrees
    pub tilt: f32,
}

impl HeadPose {
    /// Centred, unscaled, upright
    pub const NEUTRAL: HeadPose = HeadPose {
        x: 0.5,
        y: 0.5,
        scale: 1.0,
        tilt: 0.0,
    };
}

/// 3D face pose. Angles in radians, `jaw_open` in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FacePose {
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub head_roll: f32,
    pub jaw_open: f32,
    pub eye_yaw: f32,
    pub eye_pitch: f32,
}

/// Pose estimator bound to one detector's index layout
#[derive(Debug, Clone, Copy)]
pub struct PoseEstimator {
    layout: &'static LandmarkLayout,
}

impl PoseEstimator {
    pub fn new(layout: &'static LandmarkLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &'static LandmarkLayout {
        self.layout
    }

    /// Anchor, scale and tilt for the 2D avatar.
    ///
    /// Returns [`HeadPose::NEUTRAL`] if the nose or either eye is missing.
    pub fn estimate_head_pose(&self, landmarks: &LandmarkSet) -> HeadPose {
        let (Some(nose), Some(left), Some(right)) = (
            self.layout.nose(landmarks),
            self.layout.left_eye(landmarks),
            self.layout.right_eye(landmarks),
        ) else {
            return HeadPose::NEUTRAL;
        };

        let mut eye_distance = left.distance(&right);
        if eye_distance == 0.0 {
            eye_distance = FALLBACK_EYE_DISTANCE;
        }
        let roll = (right.y - left.y).atan2(right.x - left.x);

        HeadPose {
            x: nose.x,
            y: nose.y,
            scale: 0.3 + 0.4 / eye_distance,
            tilt: roll.to_degrees(),
        }
    }

    /// Full 3D pose, or `None` without a nose landmark.
    pub fn estimate_3d_pose(&self, landmarks: &LandmarkSet) -> Option<FacePose> {
        let nose = self.layout.nose(landmarks)?;

        let head_yaw = (nose.x - 0.5) * YAW_GAIN;
        let head_pitch = (0.5 - nose.y) * PITCH_GAIN;

        let head_roll = match (self.layout.left_eye(landmarks), self.layout.right_eye(landmarks)) {
            (Some(l), Some(r)) => (r.y - l.y).atan2(r.x - l.x),
            _ => 0.0,
        };

        let jaw_open = match (self.layout.upper_lip(landmarks), self.layout.lower_lip(landmarks)) {
            (Some(upper), Some(lower)) => ((lower.y - upper.y).abs() * JAW_GAIN).clamp(0.0, 1.0),
            _ => 0.0,
        };

        Some(FacePose {
            head_yaw,
            head_pitch,
            head_roll,
            jaw_open,
            eye_yaw: head_yaw * EYE_YAW_FRACTION,
            eye_pitch: head_pitch * EYE_PITCH_FRACTION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::{FACE_68, FACE_MESH_478};
    use crate::tracking::LandmarkPoint;

    const EPS: f32 = 1e-5;

    /// A full-length set with the named points placed, everything else at
    /// the frame centre.
    fn face(
        layout: &LandmarkLayout,
        nose: (f32, f32),
        left: (f32, f32),
        right: (f32, f32),
        upper_lip: (f32, f32),
        lower_lip: (f32, f32),
    ) -> LandmarkSet {
        let mut points = vec![LandmarkPoint::new(0.5, 0.5); layout.point_count];
        points[layout.nose] = LandmarkPoint::new(nose.0, nose.1);
        points[layout.left_eye_outer] = LandmarkPoint::new(left.0, left.1);
        points[layout.right_eye_outer] = LandmarkPoint::new(right.0, right.1);
        points[layout.upper_lip] = LandmarkPoint::new(upper_lip.0, upper_lip.1);
        points[layout.lower_lip] = LandmarkPoint::new(lower_lip.0, lower_lip.1);
        LandmarkSet::new(points)
    }

    fn neutral_face(layout: &LandmarkLayout) -> LandmarkSet {
        face(layout, (0.5, 0.5), (0.4, 0.5), (0.6, 0.5), (0.5, 0.6), (0.5, 0.6))
    }

    #[test]
    fn test_centred_face_has_zero_angles() {
        for layout in [&FACE_MESH_478, &FACE_68] {
            let estimator = PoseEstimator::new(layout);
            let pose = estimator.estimate_3d_pose(&neutral_face(layout)).unwrap();
            assert!(pose.head_yaw.abs() < EPS);
            assert!(pose.head_pitch.abs() < EPS);
            assert!(pose.head_roll.abs() < EPS);
            assert!(pose.eye_yaw.abs() < EPS);
            assert!(pose.eye_pitch.abs() < EPS);
        }
    }

    #[test]
    fn test_yaw_from_nose_offset() {
        let estimator = PoseEstimator::new(&FACE_MESH_478);
        let set = face(&FACE_MESH_478, (0.7, 0.5), (0.4, 0.5), (0.6, 0.5), (0.5, 0.6), (0.5, 0.6));
        let pose = estimator.estimate_3d_pose(&set).unwrap();
        assert!((pose.head_yaw - 0.24).abs() < EPS);
        assert!((pose.eye_yaw - 0.24 * 0.8).abs() < EPS);
    }

    #[test]
    fn test_pitch_from_nose_height() {
        let estimator = PoseEstimator::new(&FACE_68);
        let set = face(&FACE_68, (0.5, 0.3), (0.4, 0.5), (0.6, 0.5), (0.5, 0.6), (0.5, 0.6));
        let pose = estimator.estimate_3d_pose(&set).unwrap();
        assert!((pose.head_pitch - 0.2).abs() < EPS);
        assert!((pose.eye_pitch - 0.12).abs() < EPS);
    }

    #[test]
    fn test_jaw_open_from_lip_gap() {
        let estimator = PoseEstimator::new(&FACE_MESH_478);
        let set = face(&FACE_MESH_478, (0.5, 0.5), (0.4, 0.5), (0.6, 0.5), (0.5, 0.40), (0.5, 0.45));
        let pose = estimator.estimate_3d_pose(&set).unwrap();
        assert!((pose.jaw_open - 0.4).abs() < EPS);
    }

    #[test]
    fn test_jaw_open_is_clamped() {
        let estimator = PoseEstimator::new(&FACE_68);
        for (upper, lower) in [(0.1, 0.9), (0.9, 0.1), (0.0, 0.126), (-3.0, 5.0)] {
            let set = face(&FACE_68, (0.5, 0.5), (0.4, 0.5), (0.6, 0.5), (0.5, upper), (0.5, lower));
            let pose = estimator.estimate_3d_pose(&set).unwrap();
            assert!((0.0..=1.0).contains(&pose.jaw_open), "jaw_open {}", pose.jaw_open);
            assert_eq!(pose.jaw_open, 1.0);
        }
    }

    #[test]
    fn test_roll_from_eye_line() {
        let estimator = PoseEstimator::new(&FACE_MESH_478);
        let set = face(&FACE_MESH_478, (0.5, 0.5), (0.4, 0.4), (0.6, 0.6), (0.5, 0.6), (0.5, 0.6));
        let pose = estimator.estimate_3d_pose(&set).unwrap();
        assert!((pose.head_roll - std::f32::consts::FRAC_PI_4).abs() < EPS);

        let head = estimator.estimate_head_pose(&set);
        assert!((head.tilt - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_head_pose_scale() {
        let estimator = PoseEstimator::new(&FACE_MESH_478);
        let head = estimator.estimate_head_pose(&neutral_face(&FACE_MESH_478));
        assert!((head.x - 0.5).abs() < EPS);
        assert!((head.y - 0.5).abs() < EPS);
        // 0.3 + 0.4 / 0.2
        assert!((head.scale - 2.3).abs() < 1e-4);
        assert!(head.tilt.abs() < EPS);
    }

    #[test]
    fn test_coincident_eyes_use_fallback_distance() {
        let estimator = PoseEstimator::new(&FACE_68);
        for eye in [(0.5, 0.5), (0.3, 0.7), (0.0, 0.0)] {
            let set = face(&FACE_68, (0.5, 0.5), eye, eye, (0.5, 0.6), (0.5, 0.6));
            let head = estimator.estimate_head_pose(&set);
            assert!(head.scale.is_finite());
            assert!((head.scale - (0.3 + 0.4 / FALLBACK_EYE_DISTANCE)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_missing_nose() {
        let estimator = PoseEstimator::new(&FACE_68);
        let short = LandmarkSet::new(vec![LandmarkPoint::new(0.2, 0.2); 10]);
        assert!(estimator.estimate_3d_pose(&short).is_none());
        assert_eq!(estimator.estimate_head_pose(&short), HeadPose::NEUTRAL);
        assert!(estimator.estimate_3d_pose(&LandmarkSet::default()).is_none());
    }

    #[test]
    fn test_missing_lips_and_eyes_degrade_to_zero() {
        // Nose (index 4) resolves; eyes and lips are past the end.
        let estimator = PoseEstimator::new(&FACE_MESH_478);
        let short = LandmarkSet::new(vec![LandmarkPoint::new(0.6, 0.5); 5]);
        let pose = estimator.estimate_3d_pose(&short).unwrap();
        assert!((pose.head_yaw - 0.12).abs() < EPS);
        assert_eq!(pose.head_roll, 0.0);
        assert_eq!(pose.jaw_open, 0.0);
    }
}
