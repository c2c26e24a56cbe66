//! Daily cadence rollup entity and aggregate views.

use std::collections::BTreeMap;

use chromatrack_core::types::{DbId, Day, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::detection::DetectionEvent;

/// Number of detections of one g_id on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct DailyStat {
    pub id: DbId,
    pub g_id: String,
    #[sqlx(rename = "type")]
    pub object_type: String,
    pub cadence: i64,
    pub day: Day,
}

/// Detection count for one object type.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TypeCount {
    #[sqlx(rename = "type")]
    pub object_type: String,
    pub count: i64,
}

/// Detection count for one day.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct DayCount {
    pub day: Day,
    pub count: i64,
}

/// Aggregates over an inclusive day range.
#[derive(Debug, Clone, Serialize)]
pub struct RangeStats {
    pub from: Day,
    pub to: Day,
    pub total_detections: i64,
    pub distinct_objects: i64,
    pub by_type: Vec<TypeCount>,
    pub by_day: Vec<DayCount>,
    pub daily: Vec<DailyStat>,
}

/// Operator dashboard snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub today: BTreeMap<String, i64>,
    pub total: BTreeMap<String, i64>,
    pub recent: Vec<DetectionEvent>,
    pub daily_trend: Vec<DailyStat>,
    pub last_updated: Timestamp,
}

/// A `(g_id, day)` pair whose rollup disagrees with the events table.
///
/// `cadence` is 0 when the rollup row is missing; `events` is 0 when the
/// rollup row has no events behind it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Divergence {
    pub g_id: String,
    pub day: Day,
    pub cadence: i64,
    pub events: i64,
}
