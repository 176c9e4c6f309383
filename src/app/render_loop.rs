//! Frame-driven render loop.
//!
//! One [`RenderLoop::tick`] per display frame. Detection only runs when the
//! video timestamp has moved; the 3D rig is stepped and rendered on every
//! tick so smoothing continues between detections.

use crate::avatar::{Canvas, Compositor};
use crate::config::RenderMode;
use crate::rig::{ModelLoadStatus, SceneRenderer};
use crate::tracking::LandmarkSource;
use crate::video::FrameSource;

use super::controls::{ControlCommand, Controls};
use super::session::PoseSession;
use super::status::{Status, StatusBoard};

/// Canvas size used until the first frame arrives
pub const DEFAULT_SIZE: (u32, u32) = (640, 480);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Detector or video not ready
    Idle,
    /// Running, no face in the last detection
    Tracking,
    /// Last detection found a face
    FaceFound,
    /// Unrecoverable failure; ticks do nothing
    Halted,
}

/// What a tick did, so the caller can drive its sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The detector ran on a new frame
    pub detected: bool,
    /// The 2D canvas changed
    pub redrawn: bool,
    /// The 3D scene was rendered
    pub rendered: bool,
}

pub struct RenderLoop<S, F, R> {
    source: S,
    frames: F,
    renderer: R,
    compositor: Compositor,
    canvas: Canvas,
    session: PoseSession,
    controls: Controls,
    state: LoopState,
    status: StatusBoard,
    last_timestamp: Option<f64>,
    seen_frame: bool,
}

impl<S, F, R> RenderLoop<S, F, R>
where
    S: LandmarkSource,
    F: FrameSource,
    R: SceneRenderer,
{
    pub fn new(
        source: S,
        frames: F,
        renderer: R,
        compositor: Compositor,
        session: PoseSession,
        controls: Controls,
        status: StatusBoard,
    ) -> Self {
        Self {
            source,
            frames,
            renderer,
            compositor,
            canvas: Canvas::new(DEFAULT_SIZE.0, DEFAULT_SIZE.1),
            session,
            controls,
            state: LoopState::Idle,
            status,
            last_timestamp: None,
            seen_frame: false,
        }
    }

    /// Report readiness and apply the initial mode
    pub fn start(&mut self) {
        self.status.set(Status::Ready);
        self.set_mode(self.controls.mode);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.current()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn session(&self) -> &PoseSession {
        &self.session
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Apply a runtime control change; it takes effect on the next tick.
    pub fn apply(&mut self, command: ControlCommand) {
        tracing::debug!("Control: {:?}", command);
        match command {
            ControlCommand::Mode(mode) => self.set_mode(mode),
            ControlCommand::Debug(show) => self.set_show_debug(show),
            ControlCommand::Scale(scale) => self.set_scale(scale),
        }
    }

    pub fn set_show_debug(&mut self, show: bool) {
        self.controls.show_debug = show;
        // Redraw the current frame with the new setting.
        self.last_timestamp = None;
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.controls.scale = scale;
        self.last_timestamp = None;
    }

    /// Switch rendering mode. Entering 3D sets up the scene and requests
    /// the model if it was never requested.
    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.controls.mode {
            tracing::info!("Mode: {}", mode.as_str());
            self.last_timestamp = None;
        }
        self.controls.mode = mode;
        if mode == RenderMode::ThreeD
            && self
                .session
                .request_model(self.canvas.width(), self.canvas.height())
        {
            self.status.set(Status::Loading3d);
        }
    }

    /// Stop the loop for good with an error status
    fn halt(&mut self, message: impl Into<String>) {
        self.state = LoopState::Halted;
        self.status.set(Status::Error(message.into()));
    }

    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.state == LoopState::Halted {
            return outcome;
        }

        match self.session.poll_model() {
            Some(ModelLoadStatus::Ready) => {
                self.status.set(Status::FaceTracked);
            }
            Some(ModelLoadStatus::Failed(message)) => {
                let message = message.clone();
                self.status.set(Status::LoadError3d(message));
            }
            _ => {}
        }

        if !self.source.is_ready() {
            self.state = LoopState::Idle;
            return outcome;
        }

        let frame = match self.frames.current_frame() {
            Ok(Some(frame)) if frame.has_size() => frame,
            Ok(_) => {
                self.state = LoopState::Idle;
                return outcome;
            }
            Err(e) if !self.seen_frame => {
                self.halt(e.to_string());
                return outcome;
            }
            Err(e) => {
                self.status.set(Status::Error(e.to_string()));
                return outcome;
            }
        };
        self.seen_frame = true;
        if self.state == LoopState::Idle {
            self.state = LoopState::Tracking;
        }

        let (width, height) = (frame.width(), frame.height());
        if (width, height) != (self.canvas.width(), self.canvas.height()) {
            self.canvas.resize(width, height);
            self.session.resize(width, height);
        }

        let is_3d = self.controls.mode == RenderMode::ThreeD;

        if self.last_timestamp != Some(frame.timestamp) {
            self.last_timestamp = Some(frame.timestamp);
            outcome.detected = true;

            match self.source.detect(frame) {
                Ok(Some(landmarks)) => {
                    self.state = LoopState::FaceFound;
                    self.status.set(Status::FaceTracked);

                    let estimator = *self.session.estimator();
                    if let Some(pose) = estimator.estimate_3d_pose(&landmarks) {
                        self.session.set_target(pose);
                    }

                    if is_3d {
                        if self.session.request_model(width, height) {
                            self.status.set(Status::Loading3d);
                        }
                    } else {
                        let head = estimator.estimate_head_pose(&landmarks);
                        self.compositor.draw_frame(
                            &mut self.canvas,
                            &frame.image,
                            &landmarks,
                            &head,
                            self.controls.scale,
                            self.controls.show_debug,
                        );
                        outcome.redrawn = true;
                    }
                }
                Ok(None) => {
                    self.state = LoopState::Tracking;
                    self.status.set(Status::NoFace);
                    if !is_3d {
                        self.canvas.clear();
                        outcome.redrawn = true;
                    }
                }
                Err(e) => {
                    self.status.set(Status::Error(e.to_string()));
                }
            }
        }

        if is_3d {
            // Without a model the empty scene is still rendered.
            if self.session.is_model_ready() {
                self.session.update_3d_nodes();
            }
            if let Some(scene) = self.session.scene() {
                match self.renderer.render(scene) {
                    Ok(()) => outcome.rendered = true,
                    Err(e) => {
                        self.status.set(Status::Error(e.to_string()));
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::AvatarAssets;
    use crate::config::RigConfig;
    use crate::error::{TrackingError, WatchdogError};
    use crate::rig::model::tests::{write_gltf, HEAD_GLTF};
    use crate::rig::SnapshotRenderer;
    use crate::tracking::landmarks::FACE_MESH_478;
    use crate::config::VideoConfig;
    use crate::tracking::{LandmarkPoint, LandmarkSet};
    use crate::video::{ImageSequence, VideoFrame};
    use image::{Rgba, RgbaImage};
    use std::collections::VecDeque;
    use tempfile::TempDir;

    type Detection = Result<Option<LandmarkSet>, TrackingError>;

    /// Scripted detector; repeats "no face" once the script runs out.
    struct ScriptedSource {
        ready: bool,
        script: VecDeque<Detection>,
        calls: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Detection>) -> Self {
            Self {
                ready: true,
                script: script.into(),
                calls: 0,
            }
        }
    }

    impl LandmarkSource for ScriptedSource {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<LandmarkSet>, TrackingError> {
            self.calls += 1;
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    /// One frame whose timestamp advances only when asked
    struct ManualFrames {
        frame: Option<VideoFrame>,
        fail: bool,
    }

    impl ManualFrames {
        fn new() -> Self {
            Self {
                frame: Some(VideoFrame::new(
                    RgbaImage::from_pixel(64, 48, Rgba([200, 100, 50, 255])),
                    0,
                    0.0,
                )),
                fail: false,
            }
        }

        fn advance(&mut self) {
            if let Some(f) = self.frame.as_mut() {
                f.index += 1;
                f.timestamp += 1.0 / 30.0;
            }
        }
    }

    impl FrameSource for ManualFrames {
        fn current_frame(&mut self) -> Result<Option<&VideoFrame>, WatchdogError> {
            if self.fail {
                return Err(TrackingError::Video("camera unplugged".into()).into());
            }
            Ok(self.frame.as_ref())
        }
    }

    fn face(nose_x: f32) -> LandmarkSet {
        let mut points = vec![LandmarkPoint::new(0.5, 0.5); 478];
        points[4] = LandmarkPoint::new(nose_x, 0.5);
        points[33] = LandmarkPoint::new(0.4, 0.45);
        points[263] = LandmarkPoint::new(0.6, 0.45);
        points[13] = LandmarkPoint::new(0.5, 0.60);
        points[14] = LandmarkPoint::new(0.5, 0.62);
        LandmarkSet::new(points)
    }

    fn build(
        script: Vec<Detection>,
        mode: RenderMode,
        model_path: std::path::PathBuf,
    ) -> RenderLoop<ScriptedSource, ManualFrames, SnapshotRenderer<std::io::Sink>> {
        let rig = RigConfig {
            model_path,
            ..RigConfig::default()
        };
        let controls = Controls {
            mode,
            ..Controls::default()
        };
        RenderLoop::new(
            ScriptedSource::new(script),
            ManualFrames::new(),
            SnapshotRenderer::discard(),
            Compositor::new(&FACE_MESH_478, AvatarAssets::placeholder()),
            PoseSession::new(&FACE_MESH_478, &rig),
            controls,
            StatusBoard::new(),
        )
    }

    fn tick_until_model<S: LandmarkSource, F: FrameSource, R: SceneRenderer>(
        lp: &mut RenderLoop<S, F, R>,
    ) {
        for _ in 0..500 {
            lp.tick();
            if !matches!(lp.session().load_status(), ModelLoadStatus::Loading) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    #[test]
    fn test_idle_until_detector_ready() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(vec![], RenderMode::TwoD, dir.path().join("none.glb"));
        lp.source_mut().ready = false;
        let outcome = lp.tick();
        assert_eq!(outcome, TickOutcome::default());
        assert_eq!(lp.state(), LoopState::Idle);
        assert_eq!(lp.source_mut().calls, 0);

        lp.source_mut().ready = true;
        lp.tick();
        assert_eq!(lp.state(), LoopState::Tracking);
    }

    #[test]
    fn test_face_draws_2d_canvas() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(
            vec![Ok(Some(face(0.5)))],
            RenderMode::TwoD,
            dir.path().join("none.glb"),
        );
        lp.start();
        let outcome = lp.tick();
        assert!(outcome.detected && outcome.redrawn && !outcome.rendered);
        assert_eq!(lp.state(), LoopState::FaceFound);
        assert_eq!(lp.status(), Some(&Status::FaceTracked));
        assert_eq!((lp.canvas().width(), lp.canvas().height()), (64, 48));
        assert!(lp.canvas().image().pixels().any(|p| p[3] != 0));
        // 2D never touches the model.
        assert_eq!(lp.session().loads_started(), 0);
    }

    #[test]
    fn test_no_face_clears_2d_canvas() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(
            vec![Ok(Some(face(0.5))), Ok(None)],
            RenderMode::TwoD,
            dir.path().join("none.glb"),
        );
        lp.tick();
        lp.frames.advance();
        let outcome = lp.tick();
        assert!(outcome.redrawn);
        assert_eq!(lp.state(), LoopState::Tracking);
        assert_eq!(lp.status(), Some(&Status::NoFace));
        assert!(lp.canvas().image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_detection_gated_on_timestamp() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(vec![], RenderMode::TwoD, dir.path().join("none.glb"));
        assert!(lp.tick().detected);
        assert!(!lp.tick().detected);
        assert!(!lp.tick().detected);
        assert_eq!(lp.source_mut().calls, 1);

        lp.frames.advance();
        assert!(lp.tick().detected);
        assert_eq!(lp.source_mut().calls, 2);
    }

    #[test]
    fn test_detection_error_keeps_running() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(
            vec![Err(TrackingError::Parse("bad packet".into())), Ok(Some(face(0.5)))],
            RenderMode::TwoD,
            dir.path().join("none.glb"),
        );
        lp.tick();
        assert!(matches!(lp.status(), Some(Status::Error(_))));
        assert_ne!(lp.state(), LoopState::Halted);

        lp.frames.advance();
        lp.tick();
        assert_eq!(lp.status(), Some(&Status::FaceTracked));
    }

    #[test]
    fn test_frame_source_failure_before_first_frame_halts() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(vec![], RenderMode::TwoD, dir.path().join("none.glb"));
        lp.frames.fail = true;
        lp.tick();
        assert_eq!(lp.state(), LoopState::Halted);
        let status = lp.status().unwrap().to_string();
        assert!(status.starts_with("Error: "));
        assert!(status.contains("camera unplugged"));

        lp.frames.fail = false;
        assert_eq!(lp.tick(), TickOutcome::default());
        assert_eq!(lp.state(), LoopState::Halted);
    }

    #[test]
    fn test_frame_failure_after_start_is_transient() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(vec![], RenderMode::TwoD, dir.path().join("none.glb"));
        lp.tick();
        lp.frames.fail = true;
        lp.tick();
        assert_ne!(lp.state(), LoopState::Halted);
        lp.frames.fail = false;
        lp.frames.advance();
        assert!(lp.tick().detected);
    }

    #[test]
    fn test_double_mode_switch_loads_once() {
        let dir = TempDir::new().unwrap();
        let model = write_gltf(&dir, "head.gltf", HEAD_GLTF);
        let mut lp = build(vec![], RenderMode::TwoD, model);

        lp.set_mode(RenderMode::ThreeD);
        assert_eq!(lp.status(), Some(&Status::Loading3d));
        lp.set_mode(RenderMode::TwoD);
        lp.set_mode(RenderMode::ThreeD);
        assert_eq!(lp.session().loads_started(), 1);

        tick_until_model(&mut lp);
        assert_eq!(*lp.session().load_status(), ModelLoadStatus::Ready);
        assert_eq!(lp.session().loads_started(), 1);
    }

    #[test]
    fn test_3d_renders_every_tick_and_holds_pose() {
        let dir = TempDir::new().unwrap();
        let model = write_gltf(&dir, "head.gltf", HEAD_GLTF);
        let mut lp = build(
            vec![Ok(Some(face(0.7))), Ok(None)],
            RenderMode::ThreeD,
            model,
        );
        lp.start();
        tick_until_model(&mut lp);
        assert!(lp.session().is_model_ready());

        // The face was seen on the first tick; yaw keeps easing toward it.
        let head = lp.session().rig().unwrap().head.unwrap();
        let yaw = |lp: &RenderLoop<_, _, _>| {
            lp.session().scene().unwrap().node(head).unwrap().rotation.y
        };
        let before = yaw(&lp);

        lp.frames.advance();
        let outcome = lp.tick();
        assert!(outcome.detected && outcome.rendered && !outcome.redrawn);
        assert_eq!(lp.status(), Some(&Status::NoFace));

        let after_no_face = yaw(&lp);
        assert!(after_no_face > before);
        assert!(after_no_face < 0.24 + 1e-6);

        // No new frame: still rendered, still easing.
        let outcome = lp.tick();
        assert!(!outcome.detected && outcome.rendered);
        assert!(yaw(&lp) > after_no_face);
        assert!(lp.renderer().render_count() >= 2);
    }

    #[test]
    fn test_3d_load_failure_reports_status() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(vec![], RenderMode::ThreeD, dir.path().join("missing.glb"));
        // Consume the first frame so no detection overwrites the status below.
        lp.tick();
        lp.start();
        tick_until_model(&mut lp);
        assert!(matches!(lp.status(), Some(Status::LoadError3d(_))));

        // The scene keeps rendering, just without a model in it.
        let count = lp.renderer().render_count();
        let outcome = lp.tick();
        assert!(outcome.rendered);
        assert_eq!(lp.renderer().render_count(), count + 1);
        assert!(lp.session().scene().unwrap().model_root().is_none());
        assert!(matches!(lp.status(), Some(Status::LoadError3d(_))));
        assert_eq!(lp.session().loads_started(), 1);
    }

    #[test]
    fn test_3d_renders_while_model_loads() {
        let dir = TempDir::new().unwrap();
        let model = write_gltf(&dir, "head.gltf", HEAD_GLTF);
        let mut lp = build(vec![], RenderMode::ThreeD, model);
        lp.start();
        let outcome = lp.tick();
        assert!(outcome.rendered);
        assert_eq!(lp.renderer().render_count(), 1);
    }

    fn lime_pixels(canvas: &Canvas) -> usize {
        canvas
            .image()
            .pixels()
            .filter(|p| p.0 == [0x00, 0xFF, 0x00, 0xFF])
            .count()
    }

    fn drawn_pixels(canvas: &Canvas) -> usize {
        canvas.image().pixels().filter(|p| p[3] != 0).count()
    }

    #[test]
    fn test_runtime_controls_apply_to_next_redraw() {
        let dir = TempDir::new().unwrap();
        let mut lp = build(
            vec![Ok(Some(face(0.5))), Ok(Some(face(0.5))), Ok(Some(face(0.5)))],
            RenderMode::TwoD,
            dir.path().join("none.glb"),
        );
        lp.start();
        assert!(lp.tick().redrawn);
        assert_eq!(lime_pixels(lp.canvas()), 0);
        let full = drawn_pixels(lp.canvas());

        // Same frame, no new timestamp: the change alone triggers a redraw.
        lp.apply("debug on".parse().unwrap());
        assert!(lp.tick().redrawn);
        assert!(lp.controls().show_debug);
        assert!(lime_pixels(lp.canvas()) > 0);

        lp.apply("debug off".parse().unwrap());
        lp.apply("scale 0.5".parse().unwrap());
        assert!(lp.tick().redrawn);
        assert_eq!(lp.controls().scale, 0.5);
        assert_eq!(lime_pixels(lp.canvas()), 0);
        assert!(drawn_pixels(lp.canvas()) < full);

        // Nothing changed since: no redraw.
        assert!(!lp.tick().redrawn);
    }

    #[test]
    fn test_mode_command_switches_to_3d() {
        let dir = TempDir::new().unwrap();
        let model = write_gltf(&dir, "head.gltf", HEAD_GLTF);
        let mut lp = build(vec![Ok(Some(face(0.5)))], RenderMode::TwoD, model);
        lp.start();
        assert!(lp.tick().redrawn);
        assert_eq!(lp.session().loads_started(), 0);

        lp.apply("mode 3d".parse().unwrap());
        assert_eq!(lp.controls().mode, RenderMode::ThreeD);
        assert_eq!(lp.session().loads_started(), 1);
        let outcome = lp.tick();
        assert!(outcome.rendered && !outcome.redrawn);
    }

    fn follow_loop(
        dir: &std::path::Path,
    ) -> RenderLoop<ScriptedSource, ImageSequence, SnapshotRenderer<std::io::Sink>> {
        let video = VideoConfig {
            frames_dir: dir.to_path_buf(),
            follow: true,
            ..VideoConfig::default()
        };
        RenderLoop::new(
            ScriptedSource::new(vec![]),
            ImageSequence::open(&video).unwrap(),
            SnapshotRenderer::discard(),
            Compositor::new(&FACE_MESH_478, AvatarAssets::placeholder()),
            PoseSession::new(&FACE_MESH_478, &RigConfig::default()),
            Controls::default(),
            StatusBoard::new(),
        )
    }

    #[test]
    fn test_half_written_frame_does_not_halt_follow_mode() {
        let dir = TempDir::new().unwrap();
        let mut lp = follow_loop(dir.path());
        std::fs::write(dir.path().join("frame_00000.png"), b"\x89PNG\r\n\x1a\n").unwrap();

        let outcome = lp.tick();
        assert!(!outcome.detected);
        assert_eq!(lp.state(), LoopState::Idle);

        let img = RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("frame_00000.png")).unwrap();
        img.save(dir.path().join("frame_00001.png")).unwrap();

        assert!(lp.tick().detected);
        assert_eq!(lp.state(), LoopState::Tracking);
        assert_eq!((lp.canvas().width(), lp.canvas().height()), (8, 6));
    }

    #[test]
    fn test_missing_frame_dir_halts_follow_mode() {
        let dir = TempDir::new().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let mut lp = follow_loop(&frames);
        std::fs::remove_dir(&frames).unwrap();

        lp.tick();
        assert_eq!(lp.state(), LoopState::Halted);
    }
}
