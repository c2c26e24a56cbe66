//! Ledger delivery seam.
//!
//! The pipeline hands each [`DetectionSubmission`] to a [`LedgerClient`]. The
//! embedded [`LocalLedgerClient`] records straight into a
//! [`DetectionLedger`]; remote transports live with the binaries that need
//! them.

use async_trait::async_trait;
use chromatrack_core::submission::DetectionSubmission;
use chromatrack_db::{DetectionLedger, LedgerError};
use chrono::Utc;

/// Why a submission was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The ledger already holds this g_id. Expected and ignorable.
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// The ledger answered but did not report success.
    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Delivery timed out")]
    Timeout,
}

impl DeliveryError {
    /// Everything except a duplicate is worth trying again next window.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DeliveryError::DuplicateIdentity(_))
    }
}

/// Sends detections to the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, submission: &DetectionSubmission) -> Result<(), DeliveryError>;
}

/// Records submissions directly into an in-process ledger.
#[derive(Debug, Clone)]
pub struct LocalLedgerClient {
    ledger: DetectionLedger,
}

impl LocalLedgerClient {
    pub fn new(ledger: DetectionLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl LedgerClient for LocalLedgerClient {
    async fn submit(&self, submission: &DetectionSubmission) -> Result<(), DeliveryError> {
        let at = submission.timestamp.unwrap_or_else(Utc::now);
        self.ledger
            .record(
                &submission.g_id,
                &submission.object_type,
                &submission.color,
                at,
            )
            .await
            .map(|_| ())
            .map_err(DeliveryError::from)
    }
}

impl From<LedgerError> for DeliveryError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DuplicateIdentity(g_id) => DeliveryError::DuplicateIdentity(g_id),
            LedgerError::Timeout(_) => DeliveryError::Timeout,
            LedgerError::Database(e) => DeliveryError::Transport(e.to_string()),
            other => DeliveryError::Rejected(other.to_string()),
        }
    }
}
