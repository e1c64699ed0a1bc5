//! File-backed collaborators for running a session without a browser
//!
//! The camera serves a still image, the overlay is a pre-rendered image,
//! and face detection replays landmarks read from a JSON file.

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use image::Rgba;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use tryon_capture::Frame;
use tryon_core::{AssetRef, FaceLandmarks, Placement};
use tryon_session::{
    AssetError, AssetLoader, CapabilityError, CapabilityProbe, DetectorError, FaceDetector, FrameSource, MediaDevices,
    MediaError, MediaStream, OverlaySurface, VideoConstraints,
};

/// Read an image file into an RGBA frame
pub fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Capability answer fixed by configuration
pub struct StaticCapability {
    supported: bool,
}

impl StaticCapability {
    pub fn new(supported: bool) -> Self {
        Self { supported }
    }
}

impl CapabilityProbe for StaticCapability {
    fn immersive_ar_supported(&self) -> BoxFuture<'_, Result<bool, CapabilityError>> {
        let supported = self.supported;
        async move { Ok(supported) }.boxed()
    }
}

/// Camera stream that always shows the same frame
pub struct StillStream {
    frame: Frame,
    stopped: AtomicBool,
}

impl FrameSource for StillStream {
    fn current_frame(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.frame.clone())
        }
    }
}

impl MediaStream for StillStream {
    fn live_tracks(&self) -> usize {
        if self.stopped.load(Ordering::SeqCst) {
            0
        } else {
            1
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Camera backed by a still image; without an image it is unavailable
pub struct StillCamera {
    frame: Option<Frame>,
}

impl StillCamera {
    pub fn new(frame: Option<Frame>) -> Self {
        Self { frame }
    }
}

impl MediaDevices for StillCamera {
    fn open(&self, constraints: VideoConstraints) -> BoxFuture<'_, Result<Arc<dyn MediaStream>, MediaError>> {
        async move {
            let frame = self
                .frame
                .clone()
                .ok_or_else(|| MediaError::Unavailable("no video source configured".to_string()))?;
            debug!(
                facing = ?constraints.facing,
                width = frame.width(),
                height = frame.height(),
                "Opening still camera"
            );
            let stream = StillStream {
                frame,
                stopped: AtomicBool::new(false),
            };
            Ok(Arc::new(stream) as Arc<dyn MediaStream>)
        }
        .boxed()
    }
}

/// Pre-rendered overlay image, or a transparent surface of a fixed size
pub struct ImageOverlay {
    frame: Frame,
}

impl ImageOverlay {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self::new(Frame::from_pixel(width, height, Rgba([0, 0, 0, 0])))
    }
}

impl OverlaySurface for ImageOverlay {
    fn snapshot(&self, _placement: &Placement) -> Option<Frame> {
        Some(self.frame.clone())
    }
}

/// Checks that model files exist under a directory
pub struct FsAssetLoader {
    models_dir: Option<PathBuf>,
}

impl FsAssetLoader {
    pub fn new(models_dir: Option<PathBuf>) -> Self {
        Self { models_dir }
    }
}

impl AssetLoader for FsAssetLoader {
    fn load(&self, asset: AssetRef) -> BoxFuture<'_, Result<(), AssetError>> {
        async move {
            let Some(dir) = &self.models_dir else {
                debug!(asset = %asset, "No models directory, skipping asset check");
                return Ok(());
            };
            let path = dir.join(asset.as_str().trim_start_matches('/'));
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    info!(asset = %asset, bytes = meta.len(), "Model available");
                    Ok(())
                }
                Ok(_) => Err(AssetError::Failed(format!("{} is not a file", path.display()))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(AssetError::NotFound(path.display().to_string()))
                }
                Err(e) => Err(AssetError::Failed(e.to_string())),
            }
        }
        .boxed()
    }
}

/// Replays landmarks loaded from a JSON array of `{ "x", "y" }` points
pub struct ReplayDetector {
    landmarks: Option<FaceLandmarks>,
}

impl ReplayDetector {
    pub fn none() -> Self {
        Self { landmarks: None }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read landmarks {}", path.display()))?;
        let landmarks: FaceLandmarks = serde_json::from_str(&content)?;
        Ok(Self {
            landmarks: Some(landmarks),
        })
    }
}

impl FaceDetector for ReplayDetector {
    fn detect<'a>(&'a self, _frame: &'a Frame) -> BoxFuture<'a, Result<Option<FaceLandmarks>, DetectorError>> {
        let landmarks = self.landmarks.clone();
        async move { Ok(landmarks) }.boxed()
    }
}
