//! Periodic pruning of old detections.
//!
//! Deletes events older than the retention window through the ledger, so
//! the daily rollup is decremented in the same transaction.

use std::time::Duration;

use chrono::Utc;
use chromatrack_db::{DetectionLedger, LedgerError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("Retention window of {0} days is out of range")]
    InvalidWindow(i64),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RetentionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RetentionError::Ledger(e) if e.is_transient())
    }
}

/// Delete every detection older than `retention_days` from now.
///
/// Windows that are not positive, or that reach past the representable
/// range, are rejected without touching the ledger.
pub async fn prune_once(
    ledger: &DetectionLedger,
    retention_days: i64,
) -> Result<u64, RetentionError> {
    let cutoff = (retention_days > 0)
        .then(|| chrono::Duration::try_days(retention_days))
        .flatten()
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or(RetentionError::InvalidWindow(retention_days))?;
    Ok(ledger.delete_before(cutoff).await?)
}

/// Run the retention loop until `cancel` is triggered.
///
/// The first pass runs immediately on start.
pub async fn run(
    ledger: DetectionLedger,
    retention_days: i64,
    every: Duration,
    cancel: CancellationToken,
) {
    if every.is_zero() {
        tracing::error!("Retention job not started: interval must be greater than zero");
        return;
    }

    tracing::info!(
        retention_days,
        interval_secs = every.as_secs(),
        "Retention job started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match prune_once(&ledger, retention_days).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Retention: pruned old detections");
                    }
                    Ok(_) => {
                        tracing::debug!("Retention: nothing to prune");
                    }
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "Retention: pass failed, retrying next interval");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention: pass failed");
                    }
                }
            }
        }
    }
}
