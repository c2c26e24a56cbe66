//! Long-running background tasks spawned by the server.
//!
//! Each task takes a [`tokio_util::sync::CancellationToken`] and exits
//! cleanly when it is cancelled during graceful shutdown.

pub mod retention;
