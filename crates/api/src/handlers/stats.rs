//! Handlers for dashboard, range, and audit statistics.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use chromatrack_db::models::daily_stat::Divergence;

use crate::error::AppResult;
use crate::query::DayRangeParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Result of re-deriving the rollup from the events table.
#[derive(Debug, Serialize)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub divergences: Vec<Divergence>,
}

/// GET /stats
pub async fn dashboard(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.ledger.dashboard().await?;
    Ok(Json(DataResponse::ok(stats)))
}

/// GET /stats/range?from=&to=
///
/// An inverted range is a 400 from the ledger itself.
pub async fn range(
    State(state): State<AppState>,
    Query(params): Query<DayRangeParams>,
) -> AppResult<impl IntoResponse> {
    let stats = state.ledger.stats_for_range(params.from, params.to).await?;
    Ok(Json(DataResponse::ok(stats)))
}

/// GET /stats/consistency
pub async fn consistency(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let divergences = state.ledger.verify_consistency().await?;

    if !divergences.is_empty() {
        tracing::error!(
            count = divergences.len(),
            "Daily rollup diverges from recorded events",
        );
    }

    Ok(Json(DataResponse::ok(ConsistencyReport {
        consistent: divergences.is_empty(),
        divergences,
    })))
}
