//! `chromatrack-detector` -- colour-range object detection daemon.
//!
//! Captures frames from an image source on a fixed tick, detects coloured
//! objects, and records them in the detection ledger, either through the
//! chromatrack API (`BACKEND_URL`) or directly in a local database
//! (`DATABASE_URL`). Runs until SIGINT/SIGTERM, then stops the pipeline
//! and logs the session totals.
//!
//! See [`DetectorConfig::from_env`] for the full list of variables.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chromatrack_db::DetectionLedger;
use chromatrack_detector::config::{DetectorConfig, LedgerTarget};
use chromatrack_detector::overlay::PngOverlay;
use chromatrack_detector::sender::HttpLedgerClient;
use chromatrack_detector::source::ImageFrameSource;
use chromatrack_pipeline::{
    DetectionPipeline, LedgerClient, LocalLedgerClient, OverlayRenderer, PipelineState,
    TracingOverlay,
};

/// How often the daemon checks whether the pipeline stopped on its own.
const STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chromatrack_detector=info,chromatrack_pipeline=info,chromatrack_db=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DetectorConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid detector configuration");
        std::process::exit(1);
    });

    tracing::info!(
        ledger = ?config.ledger,
        source = %config.frame_source.display(),
        tick_ms = config.pipeline.tick_interval.as_millis() as u64,
        emit_ms = config.pipeline.emit_interval.as_millis() as u64,
        sensitivity = config.pipeline.sensitivity.value(),
        "Starting chromatrack-detector",
    );

    // --- Ledger client ---
    let client: Arc<dyn LedgerClient> = match &config.ledger {
        LedgerTarget::Remote(base_url) => {
            let client = HttpLedgerClient::new(base_url, config.ledger_timeout)
                .expect("Failed to build HTTP client");
            tracing::info!(endpoint = client.endpoint(), "Recording over HTTP");
            Arc::new(client)
        }
        LedgerTarget::Embedded(database_url) => {
            let pool = chromatrack_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            chromatrack_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Recording into embedded ledger");
            let ledger = DetectionLedger::new(pool).with_timeout(config.ledger_timeout);
            Arc::new(LocalLedgerClient::new(ledger))
        }
    };

    // --- Overlay ---
    let overlay: Arc<dyn OverlayRenderer> = match &config.overlay_dir {
        Some(dir) => {
            let overlay = PngOverlay::new(dir).expect("Failed to create overlay directory");
            tracing::info!(path = %overlay.path().display(), "Writing overlays");
            Arc::new(overlay)
        }
        None => Arc::new(TracingOverlay),
    };

    let source = Arc::new(ImageFrameSource::new(config.frame_source.clone()));

    let pipeline = DetectionPipeline::new(config.pipeline, source, overlay, client)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid pipeline configuration");
            std::process::exit(1);
        });

    if let Err(e) = pipeline.start().await {
        tracing::error!(error = %e, "Failed to start detection");
        std::process::exit(1);
    }

    tokio::select! {
        () = shutdown_signal() => {}
        () = wait_until_idle(&pipeline) => {
            tracing::warn!("Detection stopped unexpectedly, shutting down");
        }
    }

    let session = pipeline.stop().await;
    tracing::info!(
        totals = ?session.totals,
        ticks = session.ticks,
        skipped_ticks = session.skipped_ticks,
        dispatches = session.dispatches,
        delivered = session.delivered,
        duplicates = session.duplicates,
        delivery_failures = session.delivery_failures,
        last_error = session.last_error.as_deref().unwrap_or("none"),
        "Session finished",
    );
}

/// Resolve once the pipeline has left the active state by itself.
async fn wait_until_idle(pipeline: &DetectionPipeline) {
    let mut interval = tokio::time::interval(STATE_POLL_INTERVAL);
    loop {
        interval.tick().await;
        if pipeline.state().await == PipelineState::Idle {
            return;
        }
    }
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping detection");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping detection");
        }
    }
}
