//! Still-image frame source.
//!
//! Serves frames decoded from an image file, or cycles through the images of
//! a directory one per capture. Useful for replaying recorded footage and
//! for running the detector without a camera.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chromatrack_core::extraction::Frame;
use chromatrack_pipeline::{CaptureError, FrameSource};
use tokio::sync::RwLock;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageFrameSource {
    path: PathBuf,
    frames: RwLock<Vec<PathBuf>>,
    next: AtomicUsize,
}

impl ImageFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FrameSource for ImageFrameSource {
    /// Resolve the image list. A directory is re-scanned on every open.
    async fn open(&self) -> Result<(), CaptureError> {
        let path = self.path.clone();
        let frames = tokio::task::spawn_blocking(move || resolve_frames(&path))
            .await
            .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))??;

        tracing::info!(
            source = %self.path.display(),
            frames = frames.len(),
            "Frame source opened"
        );

        *self.frames.write().await = frames;
        self.next.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn capture(&self) -> Result<Frame, CaptureError> {
        let path = {
            let frames = self.frames.read().await;
            if frames.is_empty() {
                return Err(CaptureError::CameraUnavailable(format!(
                    "{} has not been opened",
                    self.path.display()
                )));
            }
            let index = self.next.fetch_add(1, Ordering::Relaxed) % frames.len();
            frames[index].clone()
        };

        tokio::task::spawn_blocking(move || decode(&path))
            .await
            .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))?
    }
}

/// List the images behind `path`, sorted by file name.
fn resolve_frames(path: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let metadata = std::fs::metadata(path).map_err(|e| io_error(path, e))?;

    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut frames: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|e| io_error(path, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    frames.sort();

    if frames.is_empty() {
        return Err(CaptureError::CameraUnavailable(format!(
            "no images in {}",
            path.display()
        )));
    }
    Ok(frames)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Decode one image into an RGBA frame.
fn decode(path: &Path) -> Result<Frame, CaptureError> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => io_error(path, io),
        other => CaptureError::CameraUnavailable(format!("{}: {other}", path.display())),
    })?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::new(width, height, rgba.into_raw())
        .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))
}

fn io_error(path: &Path, err: io::Error) -> CaptureError {
    let message = format!("{}: {err}", path.display());
    match err.kind() {
        io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(message),
        _ => CaptureError::CameraUnavailable(message),
    }
}
