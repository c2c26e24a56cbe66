//! Capture-to-ledger detection pipeline.
//!
//! [`DetectionPipeline`] drives a cancellable tick loop: each tick captures a
//! frame from a [`FrameSource`], extracts and groups colour regions, hands
//! the result to an [`OverlayRenderer`], folds it into the session totals
//! and, when the emission throttle allows, dispatches submissions to a
//! [`LedgerClient`] without waiting for them.

pub mod capture;
pub mod client;
pub mod config;
pub mod emission;
pub mod overlay;
pub mod runner;
pub mod session;

pub use capture::{CaptureError, FrameSource};
pub use client::{DeliveryError, LedgerClient, LocalLedgerClient};
pub use config::PipelineConfig;
pub use overlay::{OverlayRenderer, TracingOverlay};
pub use runner::{DetectionPipeline, PipelineError, PipelineState};
pub use session::SessionSnapshot;
