//! Overlay rendering seam.
//!
//! Rendering is synchronous so a tick can never be cancelled halfway through
//! drawing an overlay.

use chromatrack_core::grouping::GroupedDetection;

/// Draws the detections of one tick onto a canvas of the frame's size.
pub trait OverlayRenderer: Send + Sync {
    fn render(&self, detections: &[GroupedDetection], width: u32, height: u32);

    /// Remove whatever the last `render` left behind. Called on `stop()`.
    fn clear(&self) {}
}

/// Renders by logging each detection at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOverlay;

impl OverlayRenderer for TracingOverlay {
    fn render(&self, detections: &[GroupedDetection], width: u32, height: u32) {
        for d in detections {
            tracing::debug!(
                color = %d.color,
                label = %d.label,
                x = d.x,
                y = d.y,
                width = d.extent.width,
                height = d.extent.height,
                confidence = d.confidence,
                members = d.member_count,
                canvas_width = width,
                canvas_height = height,
                "Detection",
            );
        }
    }
}
