//! Wire shape of a detection handed from the pipeline to the ledger.

use serde::{Deserialize, Serialize};

use crate::grouping::GroupedDetection;
use crate::identity::resolve_g_id;
use crate::types::Timestamp;

/// One detection to be recorded, as sent over the ledger transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSubmission {
    pub g_id: String,
    pub object_type: String,
    pub color: String,
    /// Generation time. The ledger uses its own clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl DetectionSubmission {
    /// Build the submission for a grouped detection generated at `at`.
    pub fn from_detection(detection: &GroupedDetection, at: Timestamp) -> Self {
        Self {
            g_id: resolve_g_id(&detection.color, &detection.label, at),
            object_type: detection.label.clone(),
            color: detection.color.clone(),
            timestamp: Some(at),
        }
    }
}
