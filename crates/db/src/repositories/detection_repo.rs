//! Repository for the `detections` table.
//!
//! Write methods take a `&mut SqliteConnection` so they can only run inside a
//! transaction opened by [`crate::DetectionLedger`]; nothing here touches
//! `daily_stats`.

use chromatrack_core::paging::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use chromatrack_core::types::{Day, Timestamp};
use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::models::detection::{DetectionEvent, DetectionFilter, NewDetection};
use crate::time::to_db_text;

/// Column list shared across queries.
const COLUMNS: &str = "id, g_id, ref_count, type, color, datetime";

/// Provides query operations for detection events.
pub struct DetectionRepo;

impl DetectionRepo {
    /// Insert a new event with `ref_count = 1`.
    ///
    /// Fails with a unique violation if `g_id` already exists.
    pub async fn insert(
        conn: &mut SqliteConnection,
        input: &NewDetection,
    ) -> Result<DetectionEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO detections (g_id, ref_count, type, color, datetime) \
             VALUES (?1, 1, ?2, ?3, ?4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DetectionEvent>(&query)
            .bind(&input.g_id)
            .bind(&input.object_type)
            .bind(&input.color)
            .bind(to_db_text(input.datetime))
            .fetch_one(conn)
            .await
    }

    /// Count events for `g_id` whose timestamp falls on `day`.
    pub async fn count_for_day<'e, E>(executor: E, g_id: &str, day: Day) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM detections WHERE g_id = ?1 AND date(datetime) = ?2",
        )
        .bind(g_id)
        .bind(day)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Delete every event strictly older than `cutoff`.
    ///
    /// Returns the number of rows removed. The caller adjusts the rollup.
    pub async fn delete_before(
        conn: &mut SqliteConnection,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM detections WHERE datetime < ?1")
            .bind(to_db_text(cutoff))
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Newest events first.
    pub async fn recent<'e, E>(executor: E, limit: i64) -> Result<Vec<DetectionEvent>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM detections \
             ORDER BY datetime DESC, id DESC \
             LIMIT ?1"
        );
        sqlx::query_as::<_, DetectionEvent>(&query)
            .bind(clamp_limit(Some(limit), DEFAULT_LIMIT, MAX_LIMIT))
            .fetch_all(executor)
            .await
    }

    /// All events recorded under `g_id`, oldest first.
    pub async fn history<'e, E>(executor: E, g_id: &str) -> Result<Vec<DetectionEvent>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM detections WHERE g_id = ?1 ORDER BY datetime ASC, id ASC"
        );
        sqlx::query_as::<_, DetectionEvent>(&query)
            .bind(g_id)
            .fetch_all(executor)
            .await
    }

    /// Filtered, paginated listing, newest first.
    pub async fn list<'e, E>(
        executor: E,
        filter: &DetectionFilter,
    ) -> Result<Vec<DetectionEvent>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM detections \
             WHERE (?1 IS NULL OR date(datetime) >= ?1) \
               AND (?2 IS NULL OR date(datetime) <= ?2) \
               AND (?3 IS NULL OR type = ?3) \
             ORDER BY datetime DESC, id DESC \
             LIMIT ?4 OFFSET ?5"
        );
        sqlx::query_as::<_, DetectionEvent>(&query)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.object_type.as_deref())
            .bind(clamp_limit(filter.limit, DEFAULT_LIMIT, MAX_LIMIT))
            .bind(clamp_offset(filter.offset))
            .fetch_all(executor)
            .await
    }
}
