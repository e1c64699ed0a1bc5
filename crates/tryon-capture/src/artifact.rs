//! Captured still image

use base64::Engine;
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use uuid::Uuid;

use crate::compositor::CaptureError;

/// A PNG still produced by the compositor
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureArtifact {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded image bytes
    pub png: Vec<u8>,
}

impl CaptureArtifact {
    pub fn new(width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width,
            height,
            png,
        }
    }

    /// `data:` URL suitable for an `<img src>` preview
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    /// Download file name for a product
    pub fn file_name(&self, product_id: &str) -> String {
        format!("ar-tryon-{}.png", product_id)
    }

    /// Decode back into pixels
    pub fn decode(&self) -> Result<RgbaImage, CaptureError> {
        let image = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?;
        Ok(image.to_rgba8())
    }
}
