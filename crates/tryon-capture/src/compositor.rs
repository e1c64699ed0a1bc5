//! Capture compositor
//!
//! Draws the camera frame mirrored (selfie presentation) to fill the output,
//! then alpha-composites the rendered overlay on top, unmirrored. Either
//! source missing is an error and no image is produced.

use image::imageops::{self, FilterType};
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifact::CaptureArtifact;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Video surface is not available")]
    MissingVideo,
    #[error("Render surface is not available")]
    MissingRender,
    #[error("Invalid output dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Failed to encode capture: {0}")]
    Encode(#[from] image::ImageError),
}

/// Requested size of the captured still
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDims {
    pub width: u32,
    pub height: u32,
}

impl OutputDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Composite the video and render surfaces into a PNG capture
pub fn capture(
    video: Option<&RgbaImage>,
    render: Option<&RgbaImage>,
    dims: OutputDims,
) -> Result<CaptureArtifact, CaptureError> {
    let video = video.ok_or(CaptureError::MissingVideo)?;
    let render = render.ok_or(CaptureError::MissingRender)?;

    if dims.width == 0 || dims.height == 0 {
        return Err(CaptureError::InvalidDimensions {
            width: dims.width,
            height: dims.height,
        });
    }

    let mut canvas = fit(video, dims);
    imageops::flip_horizontal_in_place(&mut canvas);

    let overlay = fit(render, dims);
    imageops::overlay(&mut canvas, &overlay, 0, 0);

    let png = encode_png(&canvas)?;

    debug!(
        width = dims.width,
        height = dims.height,
        bytes = png.len(),
        "Composited capture"
    );

    Ok(CaptureArtifact::new(dims.width, dims.height, png))
}

/// Scale a surface to exactly fill the output
fn fit(surface: &RgbaImage, dims: OutputDims) -> RgbaImage {
    if surface.dimensions() == (dims.width, dims.height) {
        surface.clone()
    } else {
        imageops::resize(surface, dims.width, dims.height, FilterType::Triangle)
    }
}

fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        canvas.as_raw(),
        canvas.width(),
        canvas.height(),
        ColorType::Rgba8,
    )?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    /// Left half red, right half blue
    fn split_video(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| if x < width / 2 { RED } else { BLUE })
    }

    #[test]
    fn test_video_is_mirrored_under_overlay() {
        let video = split_video(4, 2);
        let mut render = RgbaImage::from_pixel(4, 2, CLEAR);
        render.put_pixel(0, 0, GREEN);

        let artifact = capture(Some(&video), Some(&render), OutputDims::new(4, 2)).unwrap();
        let out = artifact.decode().unwrap();

        assert_eq!(out.dimensions(), (4, 2));
        // Overlay drawn unmirrored
        assert_eq!(*out.get_pixel(0, 0), GREEN);
        // Mirrored video: blue now on the left, red on the right
        assert_eq!(*out.get_pixel(0, 1), BLUE);
        assert_eq!(*out.get_pixel(1, 1), BLUE);
        assert_eq!(*out.get_pixel(3, 0), RED);
        assert_eq!(*out.get_pixel(3, 1), RED);
    }

    #[test]
    fn test_overlay_transparency_preserved() {
        let video = RgbaImage::from_pixel(2, 2, RED);
        let render = RgbaImage::from_pixel(2, 2, CLEAR);

        let out = capture(Some(&video), Some(&render), OutputDims::new(2, 2))
            .unwrap()
            .decode()
            .unwrap();

        assert!(out.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_sources_scaled_to_output() {
        let video = RgbaImage::from_pixel(8, 8, RED);
        let render = RgbaImage::from_pixel(2, 2, CLEAR);

        let artifact = capture(Some(&video), Some(&render), OutputDims::new(4, 3)).unwrap();
        assert_eq!((artifact.width, artifact.height), (4, 3));
        assert_eq!(artifact.decode().unwrap().dimensions(), (4, 3));
    }

    #[test]
    fn test_missing_surfaces() {
        let frame = RgbaImage::from_pixel(2, 2, RED);

        assert!(matches!(
            capture(None, Some(&frame), OutputDims::new(2, 2)),
            Err(CaptureError::MissingVideo)
        ));
        assert!(matches!(
            capture(Some(&frame), None, OutputDims::new(2, 2)),
            Err(CaptureError::MissingRender)
        ));
        assert!(matches!(capture(None, None, OutputDims::new(2, 2)), Err(CaptureError::MissingVideo)));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let frame = RgbaImage::from_pixel(2, 2, RED);
        assert!(matches!(
            capture(Some(&frame), Some(&frame), OutputDims::new(0, 2)),
            Err(CaptureError::InvalidDimensions { width: 0, height: 2 })
        ));
    }
}
