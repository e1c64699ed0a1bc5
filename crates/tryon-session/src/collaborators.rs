//! Interfaces to the platform around the session
//!
//! Everything the session needs from the outside world (capability checks,
//! camera, asset loading, the 3D render surface, face detection) goes
//! through these traits so the state machine can run headless.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;
use tryon_capture::Frame;
use tryon_core::{AssetRef, FaceLandmarks, Placement};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Failed to load asset: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Face detection failed: {0}")]
pub struct DetectorError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Capability query failed: {0}")]
pub struct CapabilityError(pub String);

/// Which camera to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Requested camera stream shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Asks the platform whether immersive AR sessions are supported
pub trait CapabilityProbe: Send + Sync {
    fn immersive_ar_supported(&self) -> BoxFuture<'_, Result<bool, CapabilityError>>;
}

/// Anything that can hand out the current video frame
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Option<Frame>;
}

/// An open camera stream
pub trait MediaStream: FrameSource {
    /// Number of tracks still running
    fn live_tracks(&self) -> usize;
    /// Stop every track of the stream
    fn stop(&self);
}

/// Opens camera streams
pub trait MediaDevices: Send + Sync {
    fn open(&self, constraints: VideoConstraints) -> BoxFuture<'_, Result<Arc<dyn MediaStream>, MediaError>>;
}

/// Loads 3D assets into the renderer
pub trait AssetLoader: Send + Sync {
    fn load(&self, asset: AssetRef) -> BoxFuture<'_, Result<(), AssetError>>;
}

/// The rendered 3D overlay
pub trait OverlaySurface: Send + Sync {
    /// Current frame of the overlay, or `None` while the surface is not mounted
    fn snapshot(&self, placement: &Placement) -> Option<Frame>;
}

/// Face detection with landmarks on a single frame
pub trait FaceDetector: Send + Sync {
    fn detect<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<Option<FaceLandmarks>, DetectorError>>;
}

/// Owns an open camera stream; dropping the lease stops all of its tracks
pub struct CameraLease {
    stream: Arc<dyn MediaStream>,
}

impl CameraLease {
    pub fn new(stream: Arc<dyn MediaStream>) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &Arc<dyn MediaStream> {
        &self.stream
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        let tracks = self.stream.live_tracks();
        self.stream.stop();
        debug!(tracks = tracks, "Camera stream stopped");
    }
}

/// Slot holding the session's current camera lease, shared with the tracker
#[derive(Default)]
pub struct CameraSlot {
    lease: RwLock<Option<CameraLease>>,
}

impl CameraSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a lease, stopping any previous stream
    pub fn install(&self, lease: CameraLease) {
        let previous = match self.lease.write() {
            Ok(mut slot) => slot.replace(lease),
            Err(poisoned) => poisoned.into_inner().replace(lease),
        };
        drop(previous);
    }

    /// Release the current lease, stopping its stream
    pub fn release(&self) -> bool {
        let previous = match self.lease.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        previous.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.lease.read().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

impl FrameSource for CameraSlot {
    fn current_frame(&self) -> Option<Frame> {
        let slot = self.lease.read().ok()?;
        slot.as_ref().and_then(|lease| lease.stream().current_frame())
    }
}
