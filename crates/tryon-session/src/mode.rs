//! Presentation mode selection

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tryon_core::Category;

/// How the model is presented over the camera feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Immersive AR session with hit-test placement
    WebXr,
    /// 3D overlay on a plain camera feed
    WebGl,
    /// Overlay positioned from face landmarks
    FaceTracking,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::WebGl
    }
}

impl SessionMode {
    /// Whether this mode renders over our own camera stream.
    /// WebXR sessions own the camera themselves.
    pub fn needs_camera(&self) -> bool {
        matches!(self, Self::WebGl | Self::FaceTracking)
    }

    pub fn runs_tracker(&self) -> bool {
        matches!(self, Self::FaceTracking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebXr => "webxr",
            Self::WebGl => "webgl",
            Self::FaceTracking => "facetracking",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webxr" => Ok(Self::WebXr),
            "webgl" => Ok(Self::WebGl),
            "facetracking" => Ok(Self::FaceTracking),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeSwitchError {
    #[error("No product selected")]
    NoProduct,
    #[error("Glasses are always tried on with face tracking")]
    FaceTrackingRequired,
    #[error("Face tracking is only available for glasses")]
    FaceTrackingNotSelectable,
    #[error("Your browser or device doesn't support WebXR")]
    XrUnsupported,
}

/// Pick the mode for a freshly selected product
pub fn select_mode(category: Category, xr_supported: bool) -> SessionMode {
    match category {
        Category::Glasses => SessionMode::FaceTracking,
        _ if xr_supported => SessionMode::WebXr,
        _ => SessionMode::WebGl,
    }
}

/// Validate a user-requested switch between the WebGL and WebXR presentations
pub fn check_switch(
    category: Category,
    xr_supported: Option<bool>,
    target: SessionMode,
) -> Result<(), ModeSwitchError> {
    if category == Category::Glasses {
        return Err(ModeSwitchError::FaceTrackingRequired);
    }
    match target {
        SessionMode::FaceTracking => Err(ModeSwitchError::FaceTrackingNotSelectable),
        SessionMode::WebXr if xr_supported != Some(true) => Err(ModeSwitchError::XrUnsupported),
        _ => Ok(()),
    }
}
