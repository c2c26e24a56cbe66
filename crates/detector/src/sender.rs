//! HTTP ledger client.
//!
//! [`HttpLedgerClient`] posts each submission to the chromatrack API as JSON
//! and maps the reply onto [`DeliveryError`]. A single attempt is made per
//! submission; the next throttle window is the retry.

use std::time::Duration;

use async_trait::async_trait;
use chromatrack_core::submission::DetectionSubmission;
use chromatrack_pipeline::{DeliveryError, LedgerClient};
use reqwest::StatusCode;
use serde::Deserialize;

/// Path of the record endpoint, relative to the API base URL.
const RECORD_PATH: &str = "/api/v1/detections";

/// Error code the API uses for an already-recorded g_id.
const DUPLICATE_CODE: &str = "DUPLICATE_IDENTITY";

/// The `{ success, error?, code? }` envelope the API answers with.
#[derive(Debug, Deserialize)]
struct LedgerReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

pub struct HttpLedgerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLedgerClient {
    /// Build a client for the API at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{RECORD_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, submission: &DetectionSubmission) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(submission)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let reply = response.json::<LedgerReply>().await;

        match (status, reply) {
            (status, Ok(reply)) if status.is_success() && reply.success => Ok(()),
            (status, _) if status == StatusCode::CONFLICT => {
                Err(DeliveryError::DuplicateIdentity(submission.g_id.clone()))
            }
            (_, Ok(reply)) if reply.code.as_deref() == Some(DUPLICATE_CODE) => {
                Err(DeliveryError::DuplicateIdentity(submission.g_id.clone()))
            }
            (status, Ok(reply)) => Err(DeliveryError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                reply.error.unwrap_or_else(|| "success=false".into())
            ))),
            (status, Err(e)) if e.is_timeout() => {
                tracing::debug!(status = status.as_u16(), "Ledger reply timed out");
                Err(DeliveryError::Timeout)
            }
            (status, Err(e)) => Err(DeliveryError::Rejected(format!(
                "HTTP {}: unreadable reply: {e}",
                status.as_u16()
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Transport(err.to_string())
    }
}
