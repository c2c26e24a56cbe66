//! Per-run pipeline state.
//!
//! A session is created by `start()` and discarded by `stop()`. It owns the
//! running per-colour totals that used to be process-wide counters.

use std::collections::BTreeMap;

use chromatrack_core::grouping::GroupedDetection;
use chromatrack_core::types::Timestamp;
use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    started_at: Option<Timestamp>,
    totals: BTreeMap<String, u64>,
    ticks: u64,
    skipped_ticks: u64,
    dispatches: u64,
    submissions: u64,
    delivered: u64,
    duplicates: u64,
    delivery_failures: u64,
    last_error: Option<String>,
}

impl SessionState {
    pub(crate) fn started(at: Timestamp) -> Self {
        Self {
            started_at: Some(at),
            ..Default::default()
        }
    }

    /// Fold one tick's detections into the per-colour totals.
    pub(crate) fn record_tick(&mut self, detections: &[GroupedDetection]) {
        self.ticks += 1;
        for d in detections {
            *self.totals.entry(d.color.clone()).or_default() += 1;
        }
    }

    pub(crate) fn record_skipped(&mut self, skipped: u64) {
        self.skipped_ticks += skipped;
    }

    pub(crate) fn record_dispatch(&mut self, submissions: usize) {
        self.dispatches += 1;
        self.submissions += submissions as u64;
    }

    pub(crate) fn record_delivered(&mut self) {
        self.delivered += 1;
    }

    pub(crate) fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub(crate) fn record_delivery_failure(&mut self) {
        self.delivery_failures += 1;
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            started_at: self.started_at,
            totals: self.totals.clone(),
            ticks: self.ticks,
            skipped_ticks: self.skipped_ticks,
            dispatches: self.dispatches,
            submissions: self.submissions,
            delivered: self.delivered,
            duplicates: self.duplicates,
            delivery_failures: self.delivery_failures,
            last_error: self.last_error.clone(),
        }
    }
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub started_at: Option<Timestamp>,
    /// Grouped detections seen per colour, including ones never dispatched.
    pub totals: BTreeMap<String, u64>,
    pub ticks: u64,
    /// Ticks dropped because the previous tick overran the interval.
    pub skipped_ticks: u64,
    pub dispatches: u64,
    pub submissions: u64,
    pub delivered: u64,
    pub duplicates: u64,
    pub delivery_failures: u64,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn total(&self, color: &str) -> u64 {
        self.totals.get(color).copied().unwrap_or(0)
    }
}
