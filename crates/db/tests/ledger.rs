//! Integration tests for the detection ledger.
//!
//! Exercises `DetectionLedger` against a real SQLite database to verify that:
//! - Every record produces exactly one event and one matching rollup row
//! - Duplicate identities are rejected without changing any state
//! - Deletes decrement or drop rollup rows and never leave orphans
//! - Range aggregates, listings and the dashboard read consistent data
//! - The events table and rollup never diverge, including under concurrency

use std::time::Duration;

use assert_matches::assert_matches;
use chromatrack_core::types::{Day, Timestamp};
use chromatrack_db::models::detection::DetectionFilter;
use chromatrack_db::repositories::{DailyStatRepo, DetectionRepo};
use chromatrack_db::{DetectionLedger, LedgerError};
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(day: u32, hour: u32, min: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, day, hour, min, 0).unwrap()
}

fn day(d: u32) -> Day {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

async fn record(ledger: &DetectionLedger, g_id: &str, object_type: &str, when: Timestamp) {
    ledger
        .record(g_id, object_type, "red", when)
        .await
        .unwrap_or_else(|e| panic!("record {g_id} failed: {e}"));
}

async fn cadence(pool: &SqlitePool, g_id: &str, day: Day) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT cadence FROM daily_stats WHERE g_id = ?1 AND day = ?2")
            .bind(g_id)
            .bind(day)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0))
}

async fn event_count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM detections")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

async fn assert_consistent(ledger: &DetectionLedger) {
    let divergences = ledger.verify_consistency().await.unwrap();
    assert!(divergences.is_empty(), "ledger diverged: {divergences:?}");
}

// ---------------------------------------------------------------------------
// record
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_creates_event_and_rollup(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());

    let event = ledger
        .record("RED_MICROCHIP_CARD_1", "Microchip card", "red", at(1, 10, 0))
        .await
        .unwrap();

    assert!(event.id > 0);
    assert_eq!(event.g_id, "RED_MICROCHIP_CARD_1");
    assert_eq!(event.ref_count, 1);
    assert_eq!(event.object_type, "Microchip card");
    assert_eq!(event.color, "red");
    assert_eq!(event.datetime, at(1, 10, 0));

    let cadence = cadence(&pool, "RED_MICROCHIP_CARD_1", day(1))
        .await
        .unwrap();
    assert_eq!(cadence, Some(1));
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_ids_are_monotonic(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);

    let first = ledger.record("A", "t", "red", at(1, 10, 0)).await.unwrap();
    let second = ledger.record("B", "t", "red", at(1, 9, 0)).await.unwrap();

    assert!(second.id > first.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_identity_leaves_state_unchanged(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());
    record(&ledger, "DUP", "Custom card", at(1, 10, 0)).await;

    let err = ledger
        .record("DUP", "Custom card", "green", at(1, 11, 0))
        .await
        .unwrap_err();
    assert_matches!(err, LedgerError::DuplicateIdentity(ref g) if g == "DUP");
    assert!(!err.is_transient());

    let history = ledger.history("DUP").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ref_count, 1);
    assert_eq!(history[0].color, "red");

    let rows = DailyStatRepo::in_range(&pool, day(1), day(1)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cadence, 1);
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rollup_day_follows_utc_date(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());
    let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap();
    let early = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

    record(&ledger, "LATE", "t", late).await;
    record(&ledger, "EARLY", "t", early).await;

    assert_eq!(cadence(&pool, "LATE", day(1)).await.unwrap(), Some(1));
    assert_eq!(cadence(&pool, "EARLY", day(2)).await.unwrap(), Some(1));
    assert_eq!(cadence(&pool, "EARLY", day(1)).await.unwrap(), None);
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn zero_timeout_reports_timeout_and_records_nothing(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone()).with_timeout(Duration::ZERO);

    let err = ledger.record("SLOW", "t", "red", at(1, 10, 0)).await.unwrap_err();
    assert_matches!(err, LedgerError::Timeout(_));
    assert!(err.is_transient());

    let normal = DetectionLedger::new(pool);
    assert!(normal.history("SLOW").await.unwrap().is_empty());
    assert_consistent(&normal).await;
}

// ---------------------------------------------------------------------------
// delete_before
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_removes_rollup_at_cadence_one(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());
    record(&ledger, "OLD", "t", at(1, 10, 0)).await;
    record(&ledger, "NEW", "t", at(3, 10, 0)).await;

    let deleted = ledger.delete_before(at(2, 0, 0)).await.unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(cadence(&pool, "OLD", day(1)).await.unwrap(), None);
    assert_eq!(cadence(&pool, "NEW", day(3)).await.unwrap(), Some(1));
    assert!(ledger.history("OLD").await.unwrap().is_empty());
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_cutoff_is_exclusive(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    record(&ledger, "EDGE", "t", at(2, 0, 0)).await;

    assert_eq!(ledger.delete_before(at(2, 0, 0)).await.unwrap(), 0);
    assert_eq!(ledger.history("EDGE").await.unwrap().len(), 1);
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_with_nothing_to_remove_is_a_noop(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    assert_eq!(ledger.delete_before(at(30, 0, 0)).await.unwrap(), 0);
    assert_consistent(&ledger).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn partial_prune_keeps_row_above_zero(pool: SqlitePool) {
    let mut tx = pool.begin().await.unwrap();
    DailyStatRepo::increment(&mut tx, "PAIR", "t", day(1)).await.unwrap();
    let doubled = DailyStatRepo::increment(&mut tx, "PAIR", "t", day(1)).await.unwrap();
    assert_eq!(doubled, 2);

    sqlx::query(
        "INSERT INTO detections (g_id, ref_count, type, color, datetime) \
         VALUES ('PAIR', 1, 't', 'red', '2024-03-01T10:00:00.000Z')",
    )
    .execute(&mut *tx)
    .await
    .unwrap();

    assert_eq!(DailyStatRepo::subtract_before(&mut tx, at(2, 0, 0)).await.unwrap(), 1);
    assert_eq!(DetectionRepo::delete_before(&mut tx, at(2, 0, 0)).await.unwrap(), 1);
    assert_eq!(DailyStatRepo::delete_empty_through(&mut tx, day(2)).await.unwrap(), 0);
    tx.commit().await.unwrap();

    assert_eq!(cadence(&pool, "PAIR", day(1)).await.unwrap(), Some(1));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn bulk_prune_finishes_within_the_default_timeout(pool: SqlitePool) {
    sqlx::query(
        "WITH RECURSIVE seq(n) AS (SELECT 0 UNION ALL SELECT n + 1 FROM seq WHERE n < 19999) \
         INSERT INTO detections (g_id, ref_count, type, color, datetime) \
         SELECT 'BULK_' || n, 1, 't', 'red', \
                strftime('%Y-%m-%dT%H:%M:%S.000Z', '2024-03-01 00:00:00', \
                         '+' || (n % 5) || ' days', '+' || n || ' seconds') \
         FROM seq",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO daily_stats (g_id, type, cadence, day) \
         SELECT g_id, type, COUNT(*), date(datetime) FROM detections \
         GROUP BY g_id, date(datetime)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let ledger = DetectionLedger::new(pool.clone());
    assert_consistent(&ledger).await;

    let deleted = ledger.delete_before(at(3, 0, 0)).await.unwrap();

    assert_eq!(deleted, 8000);
    assert_eq!(event_count(&pool).await.unwrap(), 12000);
    assert_consistent(&ledger).await;
    let stats = ledger.stats_for_range(day(1), day(31)).await.unwrap();
    assert_eq!(stats.total_detections, 12000);
    assert!(stats.by_day.iter().all(|d| d.day >= day(3)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_detects_a_missing_rollup_and_rolls_back(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());
    record(&ledger, "ORPHAN", "t", at(1, 10, 0)).await;

    // Corrupt the rollup behind the ledger's back.
    sqlx::query("DELETE FROM daily_stats WHERE g_id = 'ORPHAN'")
        .execute(&pool)
        .await
        .unwrap();

    let err = ledger.delete_before(at(2, 0, 0)).await.unwrap_err();
    assert_matches!(err, LedgerError::InvariantViolation { ref g_id, .. } if g_id == "ORPHAN");

    // The delete was rolled back with the failed transaction.
    assert_eq!(ledger.history("ORPHAN").await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn stats_for_range_aggregates_inclusive_days(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    record(&ledger, "R1", "Microchip card", at(1, 8, 0)).await;
    record(&ledger, "R2", "Microchip card", at(2, 8, 0)).await;
    record(&ledger, "G1", "Custom card", at(2, 9, 0)).await;
    record(&ledger, "B1", "STM32 board", at(4, 9, 0)).await;

    let stats = ledger.stats_for_range(day(1), day(2)).await.unwrap();

    assert_eq!(stats.total_detections, 3);
    assert_eq!(stats.distinct_objects, 3);
    assert_eq!(stats.daily.len(), 3);
    assert_eq!(stats.by_type.len(), 2);
    assert_eq!(stats.by_type[0].object_type, "Custom card");
    assert_eq!(stats.by_type[0].count, 1);
    assert_eq!(stats.by_type[1].object_type, "Microchip card");
    assert_eq!(stats.by_type[1].count, 2);
    assert_eq!(stats.by_day.len(), 2);
    assert_eq!(stats.by_day[0].day, day(1));
    assert_eq!(stats.by_day[1].count, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stats_for_empty_range_is_empty(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    record(&ledger, "R1", "t", at(1, 8, 0)).await;

    let stats = ledger.stats_for_range(day(10), day(12)).await.unwrap();
    assert_eq!(stats.total_detections, 0);
    assert!(stats.daily.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stats_for_inverted_range_is_rejected(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    let err = ledger.stats_for_range(day(5), day(1)).await.unwrap_err();
    assert_matches!(err, LedgerError::InvalidRange { .. });
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn recent_orders_newest_first(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    record(&ledger, "A", "t", at(1, 8, 0)).await;
    record(&ledger, "C", "t", at(3, 8, 0)).await;
    record(&ledger, "B", "t", at(2, 8, 0)).await;

    let recent = ledger.recent(2).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|e| e.g_id.as_str()).collect();
    assert_eq!(ids, ["C", "B"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_by_type_and_day(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    record(&ledger, "R1", "Microchip card", at(1, 8, 0)).await;
    record(&ledger, "R2", "Microchip card", at(3, 8, 0)).await;
    record(&ledger, "G1", "Custom card", at(3, 9, 0)).await;

    let filter = DetectionFilter {
        from: Some(day(2)),
        object_type: Some("Microchip card".to_string()),
        ..Default::default()
    };
    let rows = ledger.list(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].g_id, "R2");

    let paged = ledger
        .list(&DetectionFilter {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].g_id, "R2");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dashboard_splits_today_from_total(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool);
    let now = Utc::now();
    record(&ledger, "TODAY", "Custom card", now).await;
    record(&ledger, "OLD", "Custom card", now - chrono::Duration::days(30)).await;

    let dash = ledger.dashboard().await.unwrap();

    assert_eq!(dash.today.get("Custom card"), Some(&1));
    assert_eq!(dash.total.get("Custom card"), Some(&2));
    assert_eq!(dash.recent.len(), 2);
    assert_eq!(dash.recent[0].g_id, "TODAY");
    assert_eq!(dash.daily_trend.len(), 1);
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn verify_consistency_reports_both_directions(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());
    record(&ledger, "A", "t", at(1, 8, 0)).await;
    record(&ledger, "B", "t", at(1, 9, 0)).await;

    sqlx::query("DELETE FROM daily_stats WHERE g_id = 'A'")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO daily_stats (g_id, type, cadence, day) VALUES ('GHOST', 't', 3, '2024-03-01')")
        .execute(&pool)
        .await
        .unwrap();

    let mut divergences = ledger.verify_consistency().await.unwrap();
    divergences.sort_by(|a, b| a.g_id.cmp(&b.g_id));

    assert_eq!(divergences.len(), 2);
    assert_eq!(divergences[0].g_id, "A");
    assert_eq!(divergences[0].cadence, 0);
    assert_eq!(divergences[0].events, 1);
    assert_eq!(divergences[1].g_id, "GHOST");
    assert_eq!(divergences[1].cadence, 3);
    assert_eq!(divergences[1].events, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn interleaved_records_and_deletes_stay_consistent(pool: SqlitePool) {
    let ledger = DetectionLedger::new(pool.clone());

    for i in 0..40u32 {
        let when = at(1 + i % 10, i % 24, i % 60);
        record(&ledger, &format!("OBJ_{i}"), ["a", "b", "c"][(i % 3) as usize], when).await;
        if i % 7 == 6 {
            ledger.delete_before(at(1 + i % 5, 12, 0)).await.unwrap();
            assert_consistent(&ledger).await;
        }
    }

    ledger.delete_before(at(6, 0, 0)).await.unwrap();
    assert_consistent(&ledger).await;

    let events = event_count(&pool).await.unwrap();
    let stats = ledger.stats_for_range(day(1), day(31)).await.unwrap();
    assert_eq!(stats.total_detections, events);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_writers_never_diverge() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let pool = chromatrack_db::create_pool(&url).await.unwrap();
    chromatrack_db::run_migrations(&pool).await.unwrap();
    let ledger = DetectionLedger::new(pool.clone()).with_timeout(Duration::from_secs(30));

    let mut handles = Vec::new();
    for worker in 0..4u32 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25u32 {
                let when = at(1 + (i % 3), worker, i);
                ledger
                    .record(&format!("W{worker}_{i}"), "t", "blue", when)
                    .await
                    .unwrap();
            }
        }));
    }
    let pruner = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for _ in 0..5 {
                ledger.delete_before(at(2, 0, 0)).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    pruner.await.unwrap();
    ledger.delete_before(at(2, 0, 0)).await.unwrap();

    assert_consistent(&ledger).await;
    let remaining = event_count(&pool).await.unwrap();
    let stats = ledger.stats_for_range(day(1), day(3)).await.unwrap();
    assert_eq!(stats.total_detections, remaining);
    assert_eq!(stats.by_day.iter().filter(|d| d.day == day(1)).count(), 0);
}

#[tokio::test]
async fn concurrent_duplicates_admit_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("dup.db").display());
    let pool = chromatrack_db::create_pool(&url).await.unwrap();
    chromatrack_db::run_migrations(&pool).await.unwrap();
    let ledger = DetectionLedger::new(pool.clone()).with_timeout(Duration::from_secs(30));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.record("SAME", "t", "red", at(1, 10, 0)).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_matches!(e, LedgerError::DuplicateIdentity(_)),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(cadence(&pool, "SAME", day(1)).await.unwrap(), Some(1));
    assert_consistent(&ledger).await;
}
