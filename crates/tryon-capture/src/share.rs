//! Share/export of captured stills
//!
//! A capture is either handed to a native share surface or, when none is
//! available (or the user asks for it), written out as a download. Both paths
//! are terminal; failures are reported and the caller keeps the artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::CaptureArtifact;

pub const SHARE_TITLE: &str = "My AR Try-On";
pub const SHARE_TEXT: &str = "Check out my virtual try-on!";

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Failed to write capture: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Native share failed: {0}")]
    Native(String),
    #[error("Share was cancelled")]
    Cancelled,
}

/// How the user asked to export the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareMethod {
    /// Native share when available, download otherwise
    #[default]
    Preferred,
    /// Always download
    Download,
}

/// Result of a successful share
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Downloaded(PathBuf),
}

/// Platform share surface (e.g. a mobile share sheet)
pub trait NativeShare: Send + Sync {
    fn share(&self, title: &str, text: &str, file_name: &str, png: &[u8]) -> Result<(), ShareError>;
}

/// Export interface used by the session
pub trait ShareTarget: Send + Sync {
    fn share(
        &self,
        artifact: &CaptureArtifact,
        product_id: &str,
        method: ShareMethod,
    ) -> Result<ShareOutcome, ShareError>;
}

/// Writes captures into a download directory
#[derive(Debug, Clone)]
pub struct DownloadShare {
    dir: PathBuf,
}

impl DownloadShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn download(&self, artifact: &CaptureArtifact, product_id: &str) -> Result<PathBuf, ShareError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(artifact.file_name(product_id));
        std::fs::write(&path, &artifact.png)?;
        info!(path = %path.display(), capture = %artifact.id, "Capture downloaded");
        Ok(path)
    }
}

/// Native share with download fallback
#[derive(Clone)]
pub struct Sharer {
    native: Option<Arc<dyn NativeShare>>,
    download: DownloadShare,
}

impl Sharer {
    pub fn new(native: Option<Arc<dyn NativeShare>>, download: DownloadShare) -> Self {
        Self { native, download }
    }

    /// Download-only sharer
    pub fn download_only(dir: impl Into<PathBuf>) -> Self {
        Self::new(None, DownloadShare::new(dir))
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }
}

impl ShareTarget for Sharer {
    fn share(
        &self,
        artifact: &CaptureArtifact,
        product_id: &str,
        method: ShareMethod,
    ) -> Result<ShareOutcome, ShareError> {
        match (&self.native, method) {
            (Some(native), ShareMethod::Preferred) => {
                let file_name = artifact.file_name(product_id);
                native
                    .share(SHARE_TITLE, SHARE_TEXT, &file_name, &artifact.png)
                    .map_err(|e| {
                        warn!(capture = %artifact.id, error = %e, "Native share failed");
                        e
                    })?;
                info!(capture = %artifact.id, "Capture shared");
                Ok(ShareOutcome::Shared)
            }
            _ => self
                .download
                .download(artifact, product_id)
                .map(ShareOutcome::Downloaded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingShare {
        shared: Mutex<Vec<String>>,
        fail: bool,
    }

    impl NativeShare for RecordingShare {
        fn share(&self, title: &str, _text: &str, file_name: &str, png: &[u8]) -> Result<(), ShareError> {
            assert_eq!(title, SHARE_TITLE);
            assert!(!png.is_empty());
            if self.fail {
                return Err(ShareError::Native("share sheet closed".to_string()));
            }
            self.shared.lock().unwrap().push(file_name.to_string());
            Ok(())
        }
    }

    fn artifact() -> CaptureArtifact {
        CaptureArtifact::new(1, 1, vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_download_fallback_without_native() {
        let dir = tempfile::tempdir().unwrap();
        let sharer = Sharer::download_only(dir.path());

        let outcome = sharer.share(&artifact(), "shirt-2", ShareMethod::Preferred).unwrap();
        let expected = dir.path().join("ar-tryon-shirt-2.png");
        assert_eq!(outcome, ShareOutcome::Downloaded(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), artifact().png);
    }

    #[test]
    fn test_native_share_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let native = Arc::new(RecordingShare {
            shared: Mutex::new(Vec::new()),
            fail: false,
        });
        let sharer = Sharer::new(Some(native.clone() as Arc<dyn NativeShare>), DownloadShare::new(dir.path()));

        assert_eq!(
            sharer.share(&artifact(), "glasses-1", ShareMethod::Preferred).unwrap(),
            ShareOutcome::Shared
        );
        assert_eq!(*native.shared.lock().unwrap(), vec!["ar-tryon-glasses-1.png".to_string()]);
        // Nothing written to disk
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Explicit download bypasses the native surface
        let outcome = sharer.share(&artifact(), "glasses-1", ShareMethod::Download).unwrap();
        assert!(matches!(outcome, ShareOutcome::Downloaded(_)));
    }

    #[test]
    fn test_native_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let native = Arc::new(RecordingShare {
            shared: Mutex::new(Vec::new()),
            fail: true,
        });
        let sharer = Sharer::new(Some(native as Arc<dyn NativeShare>), DownloadShare::new(dir.path()));

        assert!(matches!(
            sharer.share(&artifact(), "glasses-1", ShareMethod::Preferred),
            Err(ShareError::Native(_))
        ));
    }
}
