//! Route definitions for detection events.

use axum::routing::get;
use axum::Router;

use crate::handlers::detections;
use crate::state::AppState;

/// Routes mounted at `/detections`.
///
/// ```text
/// POST   /                 -> record
/// GET    /                 -> list
/// DELETE /?before=         -> prune
/// GET    /recent           -> recent
/// GET    /{g_id}           -> history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(detections::list)
                .post(detections::record)
                .delete(detections::prune),
        )
        .route("/recent", get(detections::recent))
        .route("/{g_id}", get(detections::history))
}
