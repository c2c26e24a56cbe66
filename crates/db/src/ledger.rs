//! Transactional detection ledger.
//!
//! [`DetectionLedger`] is the only writer of both tables. Every `record`
//! inserts the event and upserts its `(g_id, day)` rollup in one transaction;
//! every `delete_before` removes events and decrements (or drops) the
//! matching rollups in one transaction. Both re-check the touched pairs
//! before committing, and any mismatch aborts the whole transaction.
//!
//! SQLite admits a single writer at a time, so concurrent writes touching
//! the same pair are serialized by the database. Each operation runs under
//! a bounded timeout; a timed-out operation is dropped, which rolls back its
//! open transaction.

use std::future::Future;
use std::time::Duration;

use chromatrack_core::types::{Day, Timestamp};
use chrono::Utc;

use crate::models::daily_stat::{DashboardStats, Divergence, RangeStats};
use crate::models::detection::{DetectionEvent, DetectionFilter, NewDetection};
use crate::repositories::{DailyStatRepo, DetectionRepo};
use crate::time::day_of;
use crate::DbPool;

/// Default bound on a single ledger operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of events shown in the dashboard's recent list.
const DASHBOARD_RECENT: i64 = 10;

/// Days of rollup shown in the dashboard trend (inclusive of today).
const DASHBOARD_TREND_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The g_id is already present. Expected with timestamp-based ids.
    #[error("Detection {0} is already recorded")]
    DuplicateIdentity(String),

    /// The operation did not finish within the configured bound.
    #[error("Ledger operation timed out after {0:?}")]
    Timeout(Duration),

    /// A rollup disagreed with the events table; the transaction was rolled back.
    #[error("Ledger invariant violated for {g_id} on {day}: cadence {cadence}, events {events}")]
    InvariantViolation {
        g_id: String,
        day: Day,
        cadence: i64,
        events: i64,
    },

    #[error("Invalid day range: {from} is after {to}")]
    InvalidRange { from: Day, to: Day },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Whether retrying in a later window may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Timeout(_) | LedgerError::Database(_))
    }
}

/// Durable store of detection events with derived daily cadence.
#[derive(Debug, Clone)]
pub struct DetectionLedger {
    pool: DbPool,
    op_timeout: Duration,
}

impl DetectionLedger {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Override the per-operation timeout.
    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Record one detection and bump its daily cadence.
    ///
    /// Fails with [`LedgerError::DuplicateIdentity`] without changing any
    /// state if `g_id` is already present.
    pub async fn record(
        &self,
        g_id: &str,
        object_type: &str,
        color: &str,
        at: Timestamp,
    ) -> Result<DetectionEvent, LedgerError> {
        let input = NewDetection {
            g_id: g_id.to_string(),
            object_type: object_type.to_string(),
            color: color.to_string(),
            datetime: at,
        };
        self.bounded(self.record_tx(input)).await
    }

    async fn record_tx(&self, input: NewDetection) -> Result<DetectionEvent, LedgerError> {
        let day = day_of(input.datetime);
        let mut tx = self.pool.begin().await?;

        let event = match DetectionRepo::insert(&mut tx, &input).await {
            Ok(event) => event,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(LedgerError::DuplicateIdentity(input.g_id));
            }
            Err(e) => return Err(e.into()),
        };

        let cadence = DailyStatRepo::increment(&mut tx, &event.g_id, &event.object_type, day).await?;
        let events = DetectionRepo::count_for_day(&mut *tx, &event.g_id, day).await?;
        if cadence != events {
            return Err(invariant_violation(&event.g_id, day, cadence, events));
        }

        tx.commit().await?;

        tracing::info!(
            g_id = %event.g_id,
            object_type = %event.object_type,
            color = %event.color,
            %day,
            cadence,
            "Detection recorded",
        );
        Ok(event)
    }

    /// Delete every event older than `cutoff`, decrementing each affected
    /// rollup and removing rollups that reach zero.
    ///
    /// The work is a fixed number of set-based statements regardless of how
    /// many events are pruned. Returns the number of events deleted.
    pub async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, LedgerError> {
        self.bounded(self.delete_before_tx(cutoff)).await
    }

    async fn delete_before_tx(&self, cutoff: Timestamp) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let pairs = DailyStatRepo::subtract_before(&mut tx, cutoff).await?;
        if let Some(d) = DailyStatRepo::first_divergence_before(&mut tx, cutoff).await? {
            return Err(invariant_violation(&d.g_id, d.day, d.cadence, d.events));
        }
        let deleted = DetectionRepo::delete_before(&mut tx, cutoff).await?;
        let dropped = DailyStatRepo::delete_empty_through(&mut tx, day_of(cutoff)).await?;

        tx.commit().await?;

        if deleted > 0 {
            tracing::info!(
                deleted,
                pairs,
                dropped,
                cutoff = %cutoff,
                "Pruned detections before cutoff",
            );
        }
        Ok(deleted)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Aggregates over `from..=to`, read from a single snapshot.
    pub async fn stats_for_range(&self, from: Day, to: Day) -> Result<RangeStats, LedgerError> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let daily = DailyStatRepo::in_range(&mut *tx, from, to).await?;
            let by_type = DailyStatRepo::totals_by_type(&mut *tx, Some(from), Some(to)).await?;
            let by_day = DailyStatRepo::totals_by_day(&mut *tx, from, to).await?;
            let distinct_objects = DailyStatRepo::distinct_objects(&mut *tx, from, to).await?;
            tx.commit().await?;

            Ok::<_, LedgerError>(RangeStats {
                from,
                to,
                total_detections: by_type.iter().map(|t| t.count).sum(),
                distinct_objects,
                by_type,
                by_day,
                daily,
            })
        })
        .await
    }

    /// The `limit` newest events.
    pub async fn recent(&self, limit: i64) -> Result<Vec<DetectionEvent>, LedgerError> {
        self.bounded(async { Ok::<_, LedgerError>(DetectionRepo::recent(&self.pool, limit).await?) })
            .await
    }

    /// Filtered listing, newest first.
    pub async fn list(&self, filter: &DetectionFilter) -> Result<Vec<DetectionEvent>, LedgerError> {
        self.bounded(async { Ok::<_, LedgerError>(DetectionRepo::list(&self.pool, filter).await?) })
            .await
    }

    /// Every event recorded under `g_id`.
    pub async fn history(&self, g_id: &str) -> Result<Vec<DetectionEvent>, LedgerError> {
        self.bounded(async { Ok::<_, LedgerError>(DetectionRepo::history(&self.pool, g_id).await?) })
            .await
    }

    /// Today's and all-time totals per type, recent events and the weekly
    /// trend, read from a single snapshot.
    pub async fn dashboard(&self) -> Result<DashboardStats, LedgerError> {
        let now = Utc::now();
        let today = day_of(now);
        let trend_start = today - chrono::Duration::days(DASHBOARD_TREND_DAYS - 1);

        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let today_counts = DailyStatRepo::totals_by_type(&mut *tx, Some(today), Some(today)).await?;
            let total_counts = DailyStatRepo::totals_by_type(&mut *tx, None, None).await?;
            let recent = DetectionRepo::recent(&mut *tx, DASHBOARD_RECENT).await?;
            let daily_trend = DailyStatRepo::in_range(&mut *tx, trend_start, today).await?;
            tx.commit().await?;

            Ok::<_, LedgerError>(DashboardStats {
                today: today_counts
                    .into_iter()
                    .map(|t| (t.object_type, t.count))
                    .collect(),
                total: total_counts
                    .into_iter()
                    .map(|t| (t.object_type, t.count))
                    .collect(),
                recent,
                daily_trend,
                last_updated: now,
            })
        })
        .await
    }

    /// Re-derive the rollup from the events table and report every pair
    /// that disagrees. Empty when the ledger is consistent.
    pub async fn verify_consistency(&self) -> Result<Vec<Divergence>, LedgerError> {
        self.bounded(async { Ok::<_, LedgerError>(DailyStatRepo::divergences(&self.pool).await?) })
            .await
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| LedgerError::Timeout(self.op_timeout))?
    }
}

fn invariant_violation(g_id: &str, day: Day, cadence: i64, events: i64) -> LedgerError {
    tracing::error!(g_id, %day, cadence, events, "Daily rollup diverged from events, rolling back");
    LedgerError::InvariantViolation {
        g_id: g_id.to_string(),
        day,
        cadence,
        events,
    }
}
