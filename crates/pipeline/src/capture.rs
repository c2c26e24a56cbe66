//! Frame acquisition seam.

use async_trait::async_trait;
use chromatrack_core::extraction::Frame;

/// Why a frame could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
}

/// Yields RGBA frames on demand.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Check the source can deliver frames. Called once by `start()`.
    async fn open(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Capture the current frame.
    async fn capture(&self) -> Result<Frame, CaptureError>;
}
