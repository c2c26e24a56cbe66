pub mod detections;
pub mod health;
pub mod stats;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /detections                  record (POST), list (GET), prune (DELETE)
/// /detections/recent           newest events
/// /detections/{g_id}           history for one identity
///
/// /stats                       dashboard snapshot
/// /stats/range                 aggregates over an inclusive day range
/// /stats/consistency           rollup audit
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/detections", detections::router())
        .nest("/stats", stats::router())
}
