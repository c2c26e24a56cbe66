//! The `Idle`/`Active` pipeline state machine and its tick loop.
//!
//! `start()` opens the frame source and spawns one tick task. Ticks never
//! overlap: a tick that overruns the interval causes the missed ticks to be
//! dropped and the schedule to restart from the end of the slow tick.
//! Deliveries run on a [`TaskTracker`] so a slow ledger never delays the
//! next capture.

use std::sync::Arc;
use std::time::Duration;

use chromatrack_core::color::{ProfileSet, Sensitivity};
use chromatrack_core::error::CoreError;
use chromatrack_core::extraction::{Frame, RegionExtractor};
use chromatrack_core::grouping::{DetectionGrouper, GroupedDetection};
use chromatrack_core::submission::DetectionSubmission;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;

use crate::capture::{CaptureError, FrameSource};
use crate::client::{DeliveryError, LedgerClient};
use crate::config::PipelineConfig;
use crate::emission::EmissionThrottle;
use crate::overlay::OverlayRenderer;
use crate::session::{SessionSnapshot, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Pipeline is already active")]
    AlreadyActive,

    #[error(transparent)]
    Config(#[from] CoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Active,
}

/// Timer-driven capture, detect and dispatch loop.
///
/// All methods take `&self`; the pipeline can be shared behind an `Arc`
/// between the task that drives it and whatever reports on it.
pub struct DetectionPipeline {
    config: PipelineConfig,
    extractor: RegionExtractor,
    grouper: DetectionGrouper,
    source: Arc<dyn FrameSource>,
    overlay: Arc<dyn OverlayRenderer>,
    client: Arc<dyn LedgerClient>,
    profiles: watch::Sender<ProfileSet>,
    run: Mutex<Option<ActiveRun>>,
}

/// Bookkeeping for one `start()`..`stop()` span.
struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    deliveries: TaskTracker,
    session: Arc<Mutex<SessionState>>,
    /// Cancels the loop if the pipeline is dropped without `stop()`.
    _cancel_on_drop: DropGuard,
}

impl DetectionPipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn FrameSource>,
        overlay: Arc<dyn OverlayRenderer>,
        client: Arc<dyn LedgerClient>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let extractor = RegionExtractor::new(config.block_stride)?;
        let grouper = DetectionGrouper::new(config.group_radius)?;
        let (profiles, _) = watch::channel(ProfileSet::from_templates(
            &config.templates,
            config.sensitivity,
        ));

        Ok(Self {
            config,
            extractor,
            grouper,
            source,
            overlay,
            client,
            profiles,
            run: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// `Active` while the tick loop is running. A loop that ended on a
    /// capture failure reports `Idle`.
    pub async fn state(&self) -> PipelineState {
        match self.run.lock().await.as_ref() {
            Some(run) if !run.handle.is_finished() => PipelineState::Active,
            _ => PipelineState::Idle,
        }
    }

    /// Transition `Idle -> Active`.
    ///
    /// Fails with [`PipelineError::Capture`] and stays `Idle` if the frame
    /// source cannot be opened.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut run = self.run.lock().await;
        if let Some(active) = run.as_ref() {
            if !active.handle.is_finished() {
                return Err(PipelineError::AlreadyActive);
            }
        }
        if let Some(finished) = run.take() {
            finished.shutdown(self.config.shutdown_grace).await;
            self.overlay.clear();
        }

        if let Err(e) = self.source.open().await {
            tracing::error!(error = %e, "Frame source unavailable, pipeline stays idle");
            return Err(e.into());
        }

        let session = Arc::new(Mutex::new(SessionState::started(Utc::now())));
        let cancel = CancellationToken::new();
        let deliveries = TaskTracker::new();

        let tick_loop = TickLoop {
            tick_interval: self.config.tick_interval,
            delivery_timeout: self.config.delivery_timeout,
            extractor: self.extractor,
            grouper: self.grouper,
            throttle: EmissionThrottle::new(self.config.emit_interval),
            source: Arc::clone(&self.source),
            overlay: Arc::clone(&self.overlay),
            client: Arc::clone(&self.client),
            profiles: self.profiles.subscribe(),
            session: Arc::clone(&session),
            deliveries: deliveries.clone(),
        };
        let handle = tokio::spawn(tick_loop.run(cancel.clone()));

        *run = Some(ActiveRun {
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
            deliveries,
            session,
        });

        tracing::info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            emit_ms = self.config.emit_interval.as_millis() as u64,
            sensitivity = self.sensitivity().value(),
            "Detection pipeline started",
        );
        Ok(())
    }

    /// Transition to `Idle` from any state and return the final session.
    ///
    /// Waits up to the shutdown grace for the current tick and for in-flight
    /// deliveries. A delivery still running after that either commits or
    /// rolls back on its own; none is left half-applied.
    pub async fn stop(&self) -> SessionSnapshot {
        let Some(active) = self.run.lock().await.take() else {
            return SessionSnapshot::default();
        };

        let snapshot = active.shutdown(self.config.shutdown_grace).await;
        self.overlay.clear();

        tracing::info!(
            ticks = snapshot.ticks,
            skipped_ticks = snapshot.skipped_ticks,
            dispatches = snapshot.dispatches,
            delivered = snapshot.delivered,
            delivery_failures = snapshot.delivery_failures,
            totals = ?snapshot.totals,
            "Detection pipeline stopped",
        );
        snapshot
    }

    /// Re-derive the colour profiles. The next tick uses the new thresholds.
    pub fn set_sensitivity(&self, sensitivity: Sensitivity) {
        self.profiles
            .send_replace(ProfileSet::from_templates(&self.config.templates, sensitivity));
        tracing::info!(sensitivity = sensitivity.value(), "Sensitivity updated");
    }

    pub fn sensitivity(&self) -> Sensitivity {
        self.profiles.borrow().sensitivity()
    }

    /// Counters for the current session, or an empty snapshot when stopped.
    pub async fn session(&self) -> SessionSnapshot {
        let session = match self.run.lock().await.as_ref() {
            Some(run) => Arc::clone(&run.session),
            None => return SessionSnapshot::default(),
        };
        let snapshot = session.lock().await.snapshot();
        snapshot
    }
}

impl ActiveRun {
    async fn shutdown(self, grace: Duration) -> SessionSnapshot {
        self.cancel.cancel();

        let mut handle = self.handle;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::warn!("Tick loop did not stop within grace period, aborting");
            handle.abort();
        }

        self.deliveries.close();
        if tokio::time::timeout(grace, self.deliveries.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.deliveries.len(),
                "Deliveries still in flight after grace period",
            );
        }

        let snapshot = self.session.lock().await.snapshot();
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Tick loop
// ---------------------------------------------------------------------------

struct TickLoop {
    tick_interval: Duration,
    delivery_timeout: Duration,
    extractor: RegionExtractor,
    grouper: DetectionGrouper,
    throttle: EmissionThrottle,
    source: Arc<dyn FrameSource>,
    overlay: Arc<dyn OverlayRenderer>,
    client: Arc<dyn LedgerClient>,
    profiles: watch::Receiver<ProfileSet>,
    session: Arc<Mutex<SessionState>>,
    deliveries: TaskTracker,
}

impl TickLoop {
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let captured = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = self.source.capture() => frame,
            };
            let frame = match captured {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "Frame capture failed, pipeline going idle");
                    self.session.lock().await.record_error(e.to_string());
                    break;
                }
            };

            self.process(&frame).await;
            drop(frame);

            let elapsed = started.elapsed();
            if elapsed > self.tick_interval {
                let skipped = (elapsed.as_nanos() / self.tick_interval.as_nanos()) as u64;
                self.session.lock().await.record_skipped(skipped);
                tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    skipped,
                    "Tick overran interval, dropping missed ticks",
                );
                ticker.reset();
            }
        }

        tracing::debug!("Tick loop exited");
    }

    async fn process(&mut self, frame: &Frame) {
        let profiles = self.profiles.borrow_and_update().clone();
        let candidates = self.extractor.extract(frame, &profiles);
        let detections = self.grouper.group(&candidates, &profiles);

        self.overlay
            .render(&detections, frame.width(), frame.height());

        let dispatch = self.throttle.try_dispatch(detections.len(), Instant::now());
        {
            let mut session = self.session.lock().await;
            session.record_tick(&detections);
            if dispatch {
                session.record_dispatch(detections.len());
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            detections = detections.len(),
            dispatch,
            "Tick processed",
        );

        if dispatch {
            self.dispatch(&detections);
        }
    }

    /// Spawn one fire-and-forget submission per detection, all stamped with
    /// the same generation time.
    fn dispatch(&self, detections: &[GroupedDetection]) {
        let at = Utc::now();
        for detection in detections {
            let submission = DetectionSubmission::from_detection(detection, at);
            self.deliveries.spawn(deliver(
                Arc::clone(&self.client),
                submission,
                self.delivery_timeout,
                Arc::clone(&self.session),
            ));
        }
        tracing::info!(submissions = detections.len(), at = %at, "Dispatching detections to ledger");
    }
}

async fn deliver(
    client: Arc<dyn LedgerClient>,
    submission: DetectionSubmission,
    timeout: Duration,
    session: Arc<Mutex<SessionState>>,
) {
    let outcome = tokio::time::timeout(timeout, client.submit(&submission))
        .await
        .unwrap_or(Err(DeliveryError::Timeout));

    let mut session = session.lock().await;
    match outcome {
        Ok(()) => {
            session.record_delivered();
            tracing::info!(g_id = %submission.g_id, color = %submission.color, "Detection delivered");
        }
        Err(DeliveryError::DuplicateIdentity(g_id)) => {
            session.record_duplicate();
            tracing::debug!(g_id = %g_id, "Ledger already holds this identity, ignoring");
        }
        Err(e) => {
            session.record_delivery_failure();
            tracing::warn!(
                g_id = %submission.g_id,
                error = %e,
                "Detection delivery failed, counts kept locally",
            );
        }
    }
}
