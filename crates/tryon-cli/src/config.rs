//! Configuration loading

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tryon_capture::OutputDims;
use tryon_core::Viewport;
use tryon_session::{DriverConfig, FacingMode, SessionConfig, VideoConstraints};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub assets: AssetsSection,
    #[serde(default)]
    pub capture: CaptureSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Viewport used to map face landmarks into the scene
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f64,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    /// Spacing between face detection cycles
    #[serde(default = "default_detection_interval")]
    pub detection_interval_ms: u64,
    /// Whether the platform supports immersive AR sessions
    #[serde(default)]
    pub xr_supported: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            detection_interval_ms: default_detection_interval(),
            xr_supported: false,
        }
    }
}

fn default_viewport_width() -> f64 {
    1280.0
}

fn default_viewport_height() -> f64 {
    720.0
}

fn default_detection_interval() -> u64 {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSection {
    #[serde(default = "default_facing")]
    pub facing: FacingMode,
    #[serde(default = "default_camera_width")]
    pub ideal_width: u32,
    #[serde(default = "default_camera_height")]
    pub ideal_height: u32,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            facing: default_facing(),
            ideal_width: default_camera_width(),
            ideal_height: default_camera_height(),
        }
    }
}

fn default_facing() -> FacingMode {
    FacingMode::User
}

fn default_camera_width() -> u32 {
    1280
}

fn default_camera_height() -> u32 {
    720
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Catalog index file; the built-in catalog is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsSection {
    /// Asset index mapping products to models; built-in when unset
    #[serde(default)]
    pub index: Option<String>,
    /// Directory model paths are resolved against. Loads are not checked
    /// against the filesystem when unset.
    #[serde(default)]
    pub models_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    /// Where downloaded captures are written
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_capture_width")]
    pub width: u32,
    #[serde(default = "default_capture_height")]
    pub height: u32,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            width: default_capture_width(),
            height: default_capture_height(),
        }
    }
}

fn default_output_dir() -> String {
    "./captures".to_string()
}

fn default_capture_width() -> u32 {
    1280
}

fn default_capture_height() -> u32 {
    720
}

impl Config {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            viewport: Viewport::new(self.session.viewport_width, self.session.viewport_height),
            capture: OutputDims::new(self.capture.width, self.capture.height),
        }
    }

    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            camera: VideoConstraints {
                facing: self.camera.facing,
                ideal_width: self.camera.ideal_width,
                ideal_height: self.camera.ideal_height,
            },
            detection_interval: Duration::from_millis(self.session.detection_interval_ms),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        assets: AssetsSection {
            index: None,
            models_dir: Some("./public".to_string()),
        },
        ..Config::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
