//! Handlers for recording, listing, and pruning detection events.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use chromatrack_core::error::CoreError;
use chromatrack_core::types::Timestamp;
use chromatrack_db::models::detection::DetectionFilter;

use crate::error::{AppError, AppResult};
use crate::query::{LimitParams, ListDetectionsParams, PruneParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default size of the recent-detections feed.
const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Body of `POST /detections`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDetectionRequest {
    #[validate(length(min = 1, max = 128))]
    pub g_id: String,
    #[validate(length(min = 1, max = 64))]
    pub object_type: String,
    #[validate(length(min = 1, max = 32))]
    pub color: String,
    /// Generation time; the server clock is used when omitted.
    pub timestamp: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct PruneResult {
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_request(input: &CreateDetectionRequest) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    for (field, value) in [
        ("g_id", &input.g_id),
        ("object_type", &input.object_type),
        ("color", &input.color),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "{field} must not be blank"
            ))));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// POST /detections
// ---------------------------------------------------------------------------

/// Record one detection. Duplicates surface as 409 `DUPLICATE_IDENTITY`.
pub async fn record(
    State(state): State<AppState>,
    Json(input): Json<CreateDetectionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&input)?;

    let at = input.timestamp.unwrap_or_else(Utc::now);
    let event = state
        .ledger
        .record(&input.g_id, &input.object_type, &input.color, at)
        .await?;

    tracing::info!(
        id = event.id,
        g_id = %event.g_id,
        object_type = %event.object_type,
        "Detection recorded",
    );

    Ok((StatusCode::CREATED, Json(DataResponse::ok(event))))
}

// ---------------------------------------------------------------------------
// GET /detections
// ---------------------------------------------------------------------------

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListDetectionsParams>,
) -> AppResult<impl IntoResponse> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::BadRequest(format!(
                "from ({from}) must not be after to ({to})"
            )));
        }
    }

    let filter = DetectionFilter::from(params);
    let events = state.ledger.list(&filter).await?;
    Ok(Json(DataResponse::ok(events)))
}

// ---------------------------------------------------------------------------
// GET /detections/recent
// ---------------------------------------------------------------------------

pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let events = state.ledger.recent(limit).await?;
    Ok(Json(DataResponse::ok(events)))
}

// ---------------------------------------------------------------------------
// GET /detections/{g_id}
// ---------------------------------------------------------------------------

/// Every event recorded under one identity; 404 when there are none.
pub async fn history(
    State(state): State<AppState>,
    Path(g_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let events = state.ledger.history(&g_id).await?;
    if events.is_empty() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Detection",
            key: g_id,
        }));
    }
    Ok(Json(DataResponse::ok(events)))
}

// ---------------------------------------------------------------------------
// DELETE /detections?before=
// ---------------------------------------------------------------------------

/// Delete every event strictly older than `before`, maintaining rollups.
pub async fn prune(
    State(state): State<AppState>,
    Query(params): Query<PruneParams>,
) -> AppResult<impl IntoResponse> {
    let deleted = state.ledger.delete_before(params.before).await?;

    tracing::info!(deleted, before = %params.before, "Detections pruned");

    Ok(Json(DataResponse::ok(PruneResult { deleted })))
}
