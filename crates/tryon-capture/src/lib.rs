//! Tryon Capture - Still-image capture of the try-on view
//!
//! This crate provides:
//! - The compositor that merges the mirrored camera frame with the rendered
//!   3D overlay into one PNG still
//! - The capture artifact held by the session until it is shared or replaced
//! - The share/export collaborator (native share or file download)

pub mod artifact;
pub mod compositor;
pub mod share;

pub use artifact::CaptureArtifact;
pub use compositor::{capture, CaptureError, OutputDims};
pub use share::{DownloadShare, NativeShare, ShareError, ShareMethod, ShareOutcome, ShareTarget, Sharer};

/// A single RGBA video or render frame
pub type Frame = image::RgbaImage;
