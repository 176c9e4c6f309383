//! Pose smoothing.
//!
//! A per-field exponential moving average toward the latest detected pose.
//! It is stepped once per render tick, not per detection, so the avatar
//! keeps easing toward the last known pose while the detector is busy.

use super::FacePose;

/// Default interpolation factor per render tick
pub const SMOOTHING: f32 = 0.25;

/// Linear interpolation from `a` toward `b` by `t`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smoothing state for the six 3D pose channels.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    /// Smoothed values written to the rig
    state: FacePose,
    /// Most recent detected pose
    target: Option<FacePose>,
    alpha: f32,
}

impl Default for PoseSmoother {
    fn default() -> Self {
        Self::new(SMOOTHING)
    }
}

impl PoseSmoother {
    /// Starts from the neutral pose.
    pub fn new(alpha: f32) -> Self {
        Self {
            state: FacePose::default(),
            target: None,
            alpha: alpha.clamp(f32::EPSILON, 1.0),
        }
    }

    /// Replace the target with a newer detection
    pub fn set_target(&mut self, pose: FacePose) {
        self.target = Some(pose);
    }

    pub fn target(&self) -> Option<&FacePose> {
        self.target.as_ref()
    }

    /// Current smoothed pose
    pub fn current(&self) -> &FacePose {
        &self.state
    }

    /// Move every channel one step toward the target. Without a target
    /// nothing changes and `None` is returned.
    pub fn step(&mut self) -> Option<&FacePose> {
        let target = self.target?;
        let a = self.alpha;
        let s = &mut self.state;
        s.head_yaw = lerp(s.head_yaw, target.head_yaw, a);
        s.head_pitch = lerp(s.head_pitch, target.head_pitch, a);
        s.head_roll = lerp(s.head_roll, target.head_roll, a);
        s.jaw_open = lerp(s.jaw_open, target.jaw_open, a);
        s.eye_yaw = lerp(s.eye_yaw, target.eye_yaw, a);
        s.eye_pitch = lerp(s.eye_pitch, target.eye_pitch, a);
        Some(&self.state)
    }
}
