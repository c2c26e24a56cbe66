//! Per-frame deduplication of raw colour candidates.
//!
//! Grouping is single-pass and seed based: candidates are visited in input
//! order, each unassigned candidate seeds a new group, and every later
//! unassigned candidate of the same colour whose centre lies strictly within
//! `radius` of the *seed* joins it. Membership depends on the seed only, so
//! reordering geometrically identical input can change the grouping. For a
//! fixed input order the output is deterministic.

use serde::Serialize;

use crate::color::ProfileSet;
use crate::error::CoreError;
use crate::extraction::{Extent, RawCandidate};

/// Default merge radius, in pixels.
pub const DEFAULT_GROUP_RADIUS: f64 = 100.0;

/// One deduplicated detection for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDetection {
    pub x: f64,
    pub y: f64,
    pub extent: Extent,
    pub color: String,
    pub label: String,
    pub confidence: f64,
    pub member_count: usize,
}

impl GroupedDetection {
    /// Re-express this detection as a single raw candidate.
    pub fn as_candidate(&self) -> RawCandidate {
        RawCandidate {
            x: self.x,
            y: self.y,
            extent: self.extent,
            color: self.color.clone(),
            confidence: self.confidence,
        }
    }
}

/// Seed-based clusterer over [`RawCandidate`]s.
#[derive(Debug, Clone, Copy)]
pub struct DetectionGrouper {
    radius: f64,
}

impl Default for DetectionGrouper {
    fn default() -> Self {
        Self {
            radius: DEFAULT_GROUP_RADIUS,
        }
    }
}

impl DetectionGrouper {
    pub fn new(radius: f64) -> Result<Self, CoreError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(CoreError::Validation(format!(
                "group radius must be a positive number, got {radius}"
            )));
        }
        Ok(Self { radius })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Collapse `candidates` into one detection per group.
    ///
    /// Labels are resolved through `profiles`; a colour with no profile keeps
    /// its colour name as the label.
    pub fn group(&self, candidates: &[RawCandidate], profiles: &ProfileSet) -> Vec<GroupedDetection> {
        let mut assigned = vec![false; candidates.len()];
        let mut detections = Vec::new();

        for (seed_idx, seed) in candidates.iter().enumerate() {
            if assigned[seed_idx] {
                continue;
            }
            assigned[seed_idx] = true;

            let mut members = vec![seed];
            for (idx, other) in candidates.iter().enumerate().skip(seed_idx + 1) {
                if assigned[idx] || other.color != seed.color {
                    continue;
                }
                if distance(seed, other) < self.radius {
                    assigned[idx] = true;
                    members.push(other);
                }
            }

            let label = profiles.label_for(&seed.color).unwrap_or(&seed.color);
            detections.push(collapse(&members, label));
        }

        detections
    }
}

fn distance(a: &RawCandidate, b: &RawCandidate) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Mean centre, element-wise max extent, max confidence; colour from the seed.
fn collapse(members: &[&RawCandidate], label: &str) -> GroupedDetection {
    let seed = members[0];
    let n = members.len() as f64;
    let (sum_x, sum_y) = members
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));

    GroupedDetection {
        x: sum_x / n,
        y: sum_y / n,
        extent: members
            .iter()
            .fold(seed.extent, |acc, c| acc.max(c.extent)),
        color: seed.color.clone(),
        label: label.to_string(),
        confidence: members
            .iter()
            .map(|c| c.confidence)
            .fold(f64::MIN, f64::max),
        member_count: members.len(),
    }
}
