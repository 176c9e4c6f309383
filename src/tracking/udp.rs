//! Live landmark receiver
//!
//! Receives JSON-over-UDP packets from the external detector helper (see
//! [`super::subprocess`]). Detection runs at its own pace in the helper; the
//! receiver keeps only the newest packet so the render loop always works
//! from the latest completed detection and never waits for the next one.

use serde::Deserialize;
use std::net::{SocketAddr, UdpSocket};

use crate::config::TrackingConfig;
use crate::error::{TrackingError, WatchdogError};
use crate::tracking::{LandmarkSet, LandmarkSource, LandmarkVariant};
use crate::video::VideoFrame;

/// A single JSON packet from the detector helper
#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkPacket {
    /// Whether a face was detected this frame
    pub face_detected: bool,
    /// `[x, y]` per landmark, in detector order
    #[serde(default)]
    pub landmarks: Vec<[f32; 2]>,
    /// Frame size when `landmarks` are in pixels; absent means normalized
    #[serde(default)]
    pub image_size: Option<[f32; 2]>,
}

impl LandmarkPacket {
    /// Convert to a landmark set for the given variant
    pub fn to_landmark_set(&self, variant: LandmarkVariant) -> Option<LandmarkSet> {
        if !self.face_detected || self.landmarks.is_empty() {
            return None;
        }
        LandmarkSet::from_raw(&self.landmarks, self.image_size, variant)
    }
}

/// Landmark JSON-over-UDP receiver
pub struct UdpLandmarkSource {
    config: TrackingConfig,
    socket: Option<UdpSocket>,
    latest: Option<LandmarkPacket>,
    packets_received: u64,
}

impl UdpLandmarkSource {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            latest: None,
            packets_received: 0,
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), WatchdogError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackingError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        tracing::info!(
            "Landmark receiver listening on {} ({})",
            addr,
            self.config.variant.as_str()
        );
        self.socket = Some(socket);

        Ok(())
    }

    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Total packets parsed since start
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Read every queued packet, keeping only the newest.
    fn drain(&mut self) -> Result<(), TrackingError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(()),
        };

        let mut buf = [0u8; 65536];

        loop {
            match socket.recv(&mut buf) {
                Ok(size) if size > 0 => {
                    let packet: LandmarkPacket =
                        serde_json::from_slice(&buf[..size]).map_err(|e| {
                            TrackingError::Parse(format!("JSON parse error: {}", e))
                        })?;
                    self.latest = Some(packet);
                    self.packets_received += 1;
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    return Err(TrackingError::Receiver(format!("Receive error: {}", e)));
                }
            }
        }
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("Landmark receiver stopped");
    }
}

impl LandmarkSource for UdpLandmarkSource {
    fn is_ready(&self) -> bool {
        self.socket.is_some()
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<LandmarkSet>, TrackingError> {
        self.drain()?;
        Ok(self
            .latest
            .as_ref()
            .and_then(|p| p.to_landmark_set(self.config.variant)))
    }
}
