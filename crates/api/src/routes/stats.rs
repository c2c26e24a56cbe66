//! Route definitions for detection statistics.

use axum::routing::get;
use axum::Router;

use crate::handlers::stats;
use crate::state::AppState;

/// Routes mounted at `/stats`.
///
/// ```text
/// GET /                    -> dashboard
/// GET /range?from=&to=     -> range
/// GET /consistency         -> consistency
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(stats::dashboard))
        .route("/range", get(stats::range))
        .route("/consistency", get(stats::consistency))
}
