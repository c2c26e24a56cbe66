use std::sync::Arc;

use chromatrack_db::DetectionLedger;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (the ledger wraps a pool, the config is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Transactional detection store; the only writer of both tables.
    pub ledger: DetectionLedger,
    pub config: Arc<ServerConfig>,
}
