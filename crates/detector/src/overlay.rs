//! PNG overlay writer.
//!
//! Each render draws one box outline per detection onto a transparent canvas
//! the size of the frame and replaces `overlay.png` in the output directory.
//! The file is written under a temporary name and renamed into place, so a
//! reader never sees a half-written overlay.

use std::path::{Path, PathBuf};

use chromatrack_core::grouping::GroupedDetection;
use chromatrack_pipeline::OverlayRenderer;
use image::{ImageFormat, Rgba, RgbaImage};

pub const OVERLAY_FILE: &str = "overlay.png";
const TEMP_FILE: &str = ".overlay.png.tmp";

/// Box outline thickness, in pixels.
const STROKE: u32 = 2;

pub struct PngOverlay {
    path: PathBuf,
    temp: PathBuf,
}

impl PngOverlay {
    /// Write overlays into `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(OVERLAY_FILE),
            temp: dir.join(TEMP_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, canvas: &RgbaImage) -> Result<(), image::ImageError> {
        canvas.save_with_format(&self.temp, ImageFormat::Png)?;
        std::fs::rename(&self.temp, &self.path)?;
        Ok(())
    }
}

impl OverlayRenderer for PngOverlay {
    fn render(&self, detections: &[GroupedDetection], width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let canvas = draw(detections, width, height);
        if let Err(e) = self.write(&canvas) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write overlay");
        }
    }

    fn clear(&self) {
        for path in [&self.path, &self.temp] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to clear overlay");
                }
            }
        }
    }
}

/// Render detections onto a fresh transparent canvas.
pub fn draw(detections: &[GroupedDetection], width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    for detection in detections {
        if let Some(bounds) = box_bounds(detection, width, height) {
            stroke_rect(&mut canvas, bounds, stroke_color(&detection.color));
        }
    }
    canvas
}

/// Inclusive pixel bounds `(x0, y0, x1, y1)` of a detection's box, clipped
/// to the canvas. `None` when the box lies entirely outside it or the canvas
/// is empty.
fn box_bounds(detection: &GroupedDetection, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let half_w = f64::from(detection.extent.width) / 2.0;
    let half_h = f64::from(detection.extent.height) / 2.0;

    let left = (detection.x - half_w).floor();
    let top = (detection.y - half_h).floor();
    let right = (detection.x + half_w).ceil() - 1.0;
    let bottom = (detection.y + half_h).ceil() - 1.0;

    if width == 0 || height == 0 {
        return None;
    }
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);
    if right < 0.0 || bottom < 0.0 || left > max_x || top > max_y {
        return None;
    }

    Some((
        left.clamp(0.0, max_x) as u32,
        top.clamp(0.0, max_y) as u32,
        right.clamp(0.0, max_x) as u32,
        bottom.clamp(0.0, max_y) as u32,
    ))
}

fn stroke_rect(canvas: &mut RgbaImage, (x0, y0, x1, y1): (u32, u32, u32, u32), color: Rgba<u8>) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            let on_edge = x < x0 + STROKE || x + STROKE > x1 || y < y0 + STROKE || y + STROKE > y1;
            if on_edge {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

fn stroke_color(color: &str) -> Rgba<u8> {
    match color {
        "red" => Rgba([255, 0, 0, 255]),
        "green" => Rgba([0, 255, 0, 255]),
        "blue" => Rgba([0, 128, 255, 255]),
        _ => Rgba([255, 255, 0, 255]),
    }
}
