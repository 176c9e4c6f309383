//! Watchdog Avatar - face-tracked avatar overlay
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use watchdog_avatar::{
    app::{ControlCommand, Controls, LoopState, PoseSession, RenderLoop, Status, StatusBoard},
    avatar::{AvatarAssets, Compositor},
    config::{Config, LandmarkSourceKind, RenderMode},
    output::FrameSink,
    rig::{SceneRenderer, SnapshotRenderer},
    tracking::{
        replay::ReplayLandmarkSource,
        subprocess::{check_python_available, DetectorSubprocess},
        udp::UdpLandmarkSource,
        LandmarkSource,
    },
    video::ImageSequence,
    WatchdogError,
};

/// Watchdog Avatar - drive a 2D or 3D avatar from face landmarks
#[derive(Parser, Debug)]
#[command(name = "watchdog-avatar", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of video frames (overrides config)
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Present the newest frame instead of replaying the sequence
    #[arg(long)]
    follow: bool,

    /// Replay landmarks from a JSON-lines file instead of listening on UDP
    #[arg(short, long)]
    landmarks: Option<PathBuf>,

    /// UDP port for landmark packets (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Launch the detector helper script
    #[arg(long)]
    launch_detector: bool,

    /// Rendering mode: 2d or 3d
    #[arg(short, long)]
    mode: Option<RenderMode>,

    /// Draw every landmark on the 2D canvas
    #[arg(short, long)]
    debug: bool,

    /// Avatar scale multiplier
    #[arg(short, long)]
    scale: Option<f32>,

    /// glTF/GLB head model for 3D mode
    #[arg(long)]
    model: Option<PathBuf>,

    /// Avatar image for 2D mode
    #[arg(long)]
    avatar: Option<PathBuf>,

    /// Write composited 2D frames into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append 3D scene snapshots to this JSON-lines file
    #[arg(long)]
    scene_log: Option<PathBuf>,

    /// Ignore control commands on stdin
    #[arg(long)]
    no_controls: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

type Source = Box<dyn LandmarkSource>;
type Renderer = Box<dyn SceneRenderer>;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!(
        "Starting {} v{}",
        watchdog_avatar::NAME,
        watchdog_avatar::VERSION
    );

    let config = load_config(&args)?;

    let controls = if args.no_controls {
        None
    } else {
        Some(spawn_control_reader()?)
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, controls))?;

    info!("Watchdog Avatar stopped");
    Ok(())
}

/// Load configuration, apply CLI overrides and validate.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    if let Some(ref frames) = args.frames {
        config.video.frames_dir = frames.clone();
    }
    if args.follow {
        config.video.follow = true;
    }
    if let Some(ref landmarks) = args.landmarks {
        config.tracking.source = LandmarkSourceKind::Replay;
        config.tracking.replay_path = Some(landmarks.clone());
    }
    if let Some(port) = args.port {
        config.tracking.port = port;
    }
    if args.launch_detector {
        config.tracking.auto_launch = true;
    }
    if let Some(mode) = args.mode {
        config.avatar.mode = mode;
    }
    if args.debug {
        config.avatar.show_debug = true;
    }
    if let Some(scale) = args.scale {
        config.avatar.scale = scale;
    }
    if let Some(ref model) = args.model {
        config.rig.model_path = model.clone();
    }
    if let Some(ref avatar) = args.avatar {
        config.avatar.image_path = avatar.clone();
    }
    if let Some(ref output) = args.output {
        config.output.frames_dir = Some(output.clone());
    }
    if let Some(ref scene_log) = args.scene_log {
        config.output.scene_log = Some(scene_log.clone());
    }

    config.validate()?;

    info!("Landmark source: {:?} ({})", config.tracking.source, config.tracking.variant.as_str());
    info!("Video frames: {}", config.video.frames_dir.display());
    info!("Mode: {}", config.avatar.mode.as_str());

    Ok(config)
}

/// Read `mode`/`debug`/`scale` commands from stdin on a dedicated thread.
/// The channel closes when stdin does.
fn spawn_control_reader() -> std::io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-controls".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    info!("Runtime controls on stdin: mode 2d|3d, debug on|off, scale <factor>");
    Ok(rx)
}

async fn run(
    config: Config,
    mut controls: Option<mpsc::UnboundedReceiver<String>>,
) -> anyhow::Result<()> {
    let mut status = StatusBoard::new();
    status.set(Status::LoadingModel);

    let mut detector = None;
    let source = match open_source(&config, &mut detector) {
        Ok(source) => source,
        Err(e) => {
            status.set(Status::Error(e.to_string()));
            return Err(e.into());
        }
    };

    status.set(Status::StartingVideo);
    let frames = match ImageSequence::open(&config.video) {
        Ok(frames) => frames,
        Err(e) => {
            status.set(Status::Error(e.to_string()));
            return Err(e.into());
        }
    };

    let renderer: Renderer = match config.output.scene_log {
        Some(ref path) => Box::new(SnapshotRenderer::to_file(path)?),
        None => Box::new(SnapshotRenderer::discard()),
    };
    let mut sink = config
        .output
        .frames_dir
        .as_ref()
        .map(FrameSink::new)
        .transpose()?;

    let layout = config.tracking.variant.layout();
    let compositor = Compositor::new(layout, AvatarAssets::load(&config.avatar));
    let session = PoseSession::new(layout, &config.rig);

    let mut render_loop = RenderLoop::new(
        source,
        frames,
        renderer,
        compositor,
        session,
        Controls::from_config(&config.avatar),
        status,
    );
    render_loop.start();

    let period = Duration::from_secs_f64(1.0 / f64::from(config.display.fps));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut detector_exited = false;
    let result = loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = render_loop.tick();

                if outcome.redrawn {
                    if let Some(sink) = sink.as_mut() {
                        if let Err(e) = sink.write(render_loop.canvas().image()) {
                            warn!("Frame sink error: {}", e);
                        }
                    }
                }

                if render_loop.state() == LoopState::Halted {
                    let message = render_loop
                        .status()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "render loop halted".to_string());
                    error!("{}", message);
                    break Err(anyhow::anyhow!(message));
                }

                if let Some(ref mut sp) = detector {
                    if !detector_exited && !sp.is_running() {
                        warn!("Detector helper is no longer running; landmarks will stop updating");
                        detector_exited = true;
                    }
                }
            }
            Some(line) = next_control(&mut controls) => {
                match line.parse::<ControlCommand>() {
                    Ok(command) => render_loop.apply(command),
                    Err(e) => warn!("Ignoring control '{}': {}", line.trim(), e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break Ok(());
            }
        }
    };

    if let Some(ref mut sp) = detector {
        sp.stop().await;
    }
    if let Some(sink) = sink {
        info!("Wrote {} frames to {}", sink.frames_written(), sink.dir().display());
    }

    result
}

/// Open the configured landmark source, launching the detector helper
/// first when requested.
fn open_source(
    config: &Config,
    detector: &mut Option<DetectorSubprocess>,
) -> Result<Source, WatchdogError> {
    match config.tracking.source {
        LandmarkSourceKind::Replay => {
            let path = config
                .tracking
                .replay_path
                .as_ref()
                .ok_or_else(|| {
                    watchdog_avatar::error::ConfigError::MissingField(
                        "tracking.replay_path".to_string(),
                    )
                })?;
            Ok(Box::new(ReplayLandmarkSource::from_path(
                path,
                config.tracking.variant,
            )?))
        }
        LandmarkSourceKind::Udp => {
            let mut receiver = UdpLandmarkSource::new(&config.tracking);
            receiver.start()?;

            if config.tracking.auto_launch {
                if !check_python_available() {
                    warn!("python3 not found; the detector helper will likely fail to start");
                }
                let mut sp = DetectorSubprocess::new(&config.tracking);
                sp.start()?;
                *detector = Some(sp);
            }

            Ok(Box::new(receiver))
        }
    }
}

/// Next control line, or pending forever once controls are off or closed.
async fn next_control(controls: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match controls {
        Some(rx) => match rx.recv().await {
            Some(line) => Some(line),
            None => {
                *controls = None;
                std::future::pending().await
            }
        },
        None => std::future::pending().await,
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
