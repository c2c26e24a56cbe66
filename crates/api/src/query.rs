//! Shared query parameter types for API handlers.

use chromatrack_core::types::{Day, Timestamp};
use chromatrack_db::models::detection::DetectionFilter;
use serde::Deserialize;

/// `GET /detections?from=&to=&type=&limit=&offset=`.
///
/// Day bounds are inclusive `YYYY-MM-DD`. Limits are clamped in the
/// repository layer via `clamp_limit` / `clamp_offset`.
#[derive(Debug, Default, Deserialize)]
pub struct ListDetectionsParams {
    pub from: Option<Day>,
    pub to: Option<Day>,
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<ListDetectionsParams> for DetectionFilter {
    fn from(params: ListDetectionsParams) -> Self {
        DetectionFilter {
            from: params.from,
            to: params.to,
            object_type: params.object_type.filter(|t| !t.is_empty()),
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// `?limit=` for the recent-detections feed.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// `?from=&to=` inclusive day range.
#[derive(Debug, Deserialize)]
pub struct DayRangeParams {
    pub from: Day,
    pub to: Day,
}

/// `?before=` RFC 3339 cutoff for manual pruning.
#[derive(Debug, Deserialize)]
pub struct PruneParams {
    pub before: Timestamp,
}
