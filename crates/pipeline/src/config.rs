//! Pipeline tunables.

use std::time::Duration;

use chromatrack_core::color::{ProfileTemplate, Sensitivity, STANDARD_TEMPLATES};
use chromatrack_core::error::CoreError;
use chromatrack_core::extraction::DEFAULT_BLOCK_STRIDE;
use chromatrack_core::grouping::DEFAULT_GROUP_RADIUS;

/// Default time between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Default throttle window between ledger dispatches.
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_millis(1000);

/// Default bound on a single submission.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time `stop()` waits for the loop and in-flight deliveries.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tick_interval: Duration,
    /// Minimum time between two dispatches to the ledger.
    pub emit_interval: Duration,
    pub block_stride: u32,
    pub group_radius: f64,
    pub sensitivity: Sensitivity,
    pub templates: Vec<ProfileTemplate>,
    pub delivery_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            emit_interval: DEFAULT_EMIT_INTERVAL,
            block_stride: DEFAULT_BLOCK_STRIDE,
            group_radius: DEFAULT_GROUP_RADIUS,
            sensitivity: Sensitivity::default(),
            templates: STANDARD_TEMPLATES.to_vec(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl PipelineConfig {
    /// Reject settings the tick loop cannot run with.
    ///
    /// Stride and radius are checked by the extractor and grouper
    /// constructors.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick_interval.is_zero() {
            return Err(CoreError::Validation(
                "tick interval must be greater than zero".into(),
            ));
        }
        if self.delivery_timeout.is_zero() {
            return Err(CoreError::Validation(
                "delivery timeout must be greater than zero".into(),
            ));
        }
        if self.templates.is_empty() {
            return Err(CoreError::Validation(
                "at least one colour profile is required".into(),
            ));
        }
        Ok(())
    }
}
