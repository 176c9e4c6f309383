//! Detector helper subprocess
//!
//! Launches and manages the external face landmark detector (a Python
//! script wrapping the model) as a child process with automatic cleanup on
//! drop. The helper captures the camera and streams landmark packets to
//! [`super::udp::UdpLandmarkSource`].

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use crate::config::TrackingConfig;
use crate::error::{TrackingError, WatchdogError};

/// Manages the detector helper subprocess
pub struct DetectorSubprocess {
    child: Option<Child>,
    config: TrackingConfig,
}

impl DetectorSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
        }
    }

    /// Build the helper command line.
    ///
    /// Runs: `python3 <tracker_script> --ip <listen_address> --port <port>
    ///        --variant <variant> --capture <camera_device>`
    fn command(&self) -> Command {
        let mut cmd = Command::new("python3");
        cmd.arg(&self.config.tracker_script)
            .args(["--ip", &self.config.listen_address])
            .args(["--port", &self.config.port.to_string()])
            .args(["--variant", self.config.variant.as_str()])
            .args(["--capture", &self.config.camera_device.to_string()])
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped());
        cmd
    }

    /// Launch the detector helper. Must be called inside a Tokio runtime.
    pub fn start(&mut self) -> Result<(), WatchdogError> {
        let cmd = self.command();
        self.launch(cmd)
    }

    fn launch(&mut self, mut cmd: Command) -> Result<(), WatchdogError> {
        if self.is_running() {
            return Ok(());
        }

        let mut child = cmd.spawn().map_err(|e| {
            TrackingError::Subprocess(format!(
                "Failed to launch detector at '{}': {}",
                self.config.tracker_script, e
            ))
        })?;

        tracing::info!(
            "Detector subprocess started (pid: {:?}, camera: {}, port: {})",
            child.id(),
            self.config.camera_device,
            self.config.port,
        );

        // The helper blocks once the pipe fills up, so stderr is drained
        // for as long as it stays open.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Detector subprocess exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check detector subprocess status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping detector subprocess (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

/// Relay the helper's stderr into the log, one line at a time.
async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: "detector", "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Detector stderr closed: {}", e);
                break;
            }
        }
    }
}

/// Check if `python3` can be executed at all.
pub fn check_python_available() -> bool {
    match std::process::Command::new("python3")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}
