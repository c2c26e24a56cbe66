//! Ledger emission throttle.
//!
//! Local totals are updated every tick, but a dispatch to the ledger only
//! happens when the tick saw at least one detection and a full throttle
//! window has passed since the previous dispatch. Detections in between are
//! counted locally and never sent.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct EmissionThrottle {
    interval: Duration,
    last_dispatch: Option<Instant>,
}

impl EmissionThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: None,
        }
    }

    /// Decide whether a tick with `detections` detections at `now` should
    /// dispatch, and if so start a new window at `now`.
    pub fn try_dispatch(&mut self, detections: usize, now: Instant) -> bool {
        if detections == 0 {
            return false;
        }
        let window_open = match self.last_dispatch {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if window_open {
            self.last_dispatch = Some(now);
        }
        window_open
    }
}
