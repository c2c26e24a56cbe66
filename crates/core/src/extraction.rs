//! Block-sampled colour region extraction.
//!
//! [`RegionExtractor`] walks a frame on a regular grid and tests one
//! representative pixel per block (the block centre) against every active
//! profile. Each match becomes a [`RawCandidate`]; adjacent blocks of the same
//! object match independently, so the output is expected to contain many
//! near-duplicates that [`crate::grouping`] later merges.

use serde::Serialize;

use crate::color::{ProfileSet, Rgb};
use crate::error::CoreError;

/// Default spacing between sampled pixels, in pixels.
pub const DEFAULT_BLOCK_STRIDE: u32 = 20;

const RGBA_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A full-resolution RGBA pixel buffer, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an RGBA buffer, checking that it is exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CoreError> {
        let expected = width as usize * height as usize * RGBA_BYTES;
        if data.len() != expected {
            return Err(CoreError::Validation(format!(
                "frame buffer for {width}x{height} must be {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Self {
        let data = [color.r, color.g, color.b, 255]
            .into_iter()
            .cycle()
            .take(width as usize * height as usize * RGBA_BYTES)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The pixel at `(x, y)`, or `None` when outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_BYTES;
        let px = self.data.get(offset..offset + 3)?;
        Some(Rgb::new(px[0], px[1], px[2]))
    }

    /// Overwrite the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_BYTES;
        self.data[offset] = color.r;
        self.data[offset + 1] = color.g;
        self.data[offset + 2] = color.b;
    }

    /// Paint an axis-aligned rectangle (clipped to the frame).
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgb) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                self.put_pixel(px, py, color);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// Width and height of a detection box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    /// Element-wise maximum.
    pub fn max(self, other: Extent) -> Extent {
        Extent {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// One block that matched one profile. Lives for a single frame cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawCandidate {
    pub x: f64,
    pub y: f64,
    pub extent: Extent,
    pub color: String,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Grid scanner that turns a frame into raw colour candidates.
#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
    block_stride: u32,
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self {
            block_stride: DEFAULT_BLOCK_STRIDE,
        }
    }
}

impl RegionExtractor {
    pub fn new(block_stride: u32) -> Result<Self, CoreError> {
        if block_stride == 0 {
            return Err(CoreError::Validation(
                "block stride must be greater than zero".into(),
            ));
        }
        Ok(Self { block_stride })
    }

    pub fn block_stride(&self) -> u32 {
        self.block_stride
    }

    /// Every candidate box is twice the stride on each side.
    pub fn candidate_extent(&self) -> Extent {
        Extent::square(self.block_stride.saturating_mul(2))
    }

    /// Scan `frame` and emit one candidate per (block, matching profile).
    ///
    /// Sample points that fall outside the buffer are skipped.
    pub fn extract(&self, frame: &Frame, profiles: &ProfileSet) -> Vec<RawCandidate> {
        let stride = self.block_stride;
        let half = stride / 2;
        let extent = self.candidate_extent();
        let mut candidates = Vec::new();

        for block_y in (0..frame.height()).step_by(stride as usize) {
            for block_x in (0..frame.width()).step_by(stride as usize) {
                let (sx, sy) = (block_x + half, block_y + half);
                let Some(pixel) = frame.pixel(sx, sy) else {
                    continue;
                };

                for profile in profiles.profiles() {
                    if let Some(confidence) = profile.classify(pixel) {
                        candidates.push(RawCandidate {
                            x: f64::from(sx),
                            y: f64::from(sy),
                            extent,
                            color: profile.name.clone(),
                            confidence,
                        });
                    }
                }
            }
        }

        candidates
    }
}
