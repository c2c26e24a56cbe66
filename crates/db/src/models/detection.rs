//! Detection event entity and DTOs.

use chromatrack_core::types::{DbId, Day, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A recorded detection. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DetectionEvent {
    pub id: DbId,
    pub g_id: String,
    pub ref_count: i64,
    #[sqlx(rename = "type")]
    pub object_type: String,
    pub color: String,
    pub datetime: Timestamp,
}

/// DTO for inserting a new detection.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDetection {
    pub g_id: String,
    pub object_type: String,
    pub color: String,
    pub datetime: Timestamp,
}

/// Filters for listing detections. Day bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionFilter {
    pub from: Option<Day>,
    pub to: Option<Day>,
    pub object_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
