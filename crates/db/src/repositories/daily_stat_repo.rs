//! Repository for the `daily_stats` rollup table.

use chromatrack_core::types::{Day, Timestamp};
use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::models::daily_stat::{DailyStat, DayCount, Divergence, TypeCount};
use crate::time::to_db_text;

/// Column list shared across queries.
const COLUMNS: &str = "id, g_id, type, cadence, day";

/// Provides rollup maintenance and aggregate reads.
pub struct DailyStatRepo;

impl DailyStatRepo {
    // ── Maintenance (transaction-bound) ──────────────────────────────

    /// Add one sighting to `(g_id, day)`, creating the row at cadence 1.
    ///
    /// Returns the cadence after the upsert.
    pub async fn increment(
        conn: &mut SqliteConnection,
        g_id: &str,
        object_type: &str,
        day: Day,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO daily_stats (g_id, type, cadence, day) \
             VALUES (?1, ?2, 1, ?3) \
             ON CONFLICT(g_id, day) DO UPDATE SET cadence = cadence + 1 \
             RETURNING cadence",
        )
        .bind(g_id)
        .bind(object_type)
        .bind(day)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Subtract, per `(g_id, day)`, the number of events older than `cutoff`.
    ///
    /// Returns the number of rollup rows adjusted.
    pub async fn subtract_before(
        conn: &mut SqliteConnection,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE daily_stats SET cadence = cadence - pruned.n \
             FROM ( \
                 SELECT g_id, date(datetime) AS day, COUNT(*) AS n \
                 FROM detections WHERE datetime < ?1 \
                 GROUP BY g_id, date(datetime) \
             ) AS pruned \
             WHERE daily_stats.g_id = pruned.g_id AND daily_stats.day = pruned.day",
        )
        .bind(to_db_text(cutoff))
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// The first pair touched by a prune before `cutoff` whose rollup does
    /// not match the events that will survive it.
    ///
    /// Run after [`Self::subtract_before`] and before the events are deleted.
    /// A missing rollup row is reported with cadence 0.
    pub async fn first_divergence_before(
        conn: &mut SqliteConnection,
        cutoff: Timestamp,
    ) -> Result<Option<Divergence>, sqlx::Error> {
        sqlx::query_as::<_, Divergence>(
            "WITH pruned AS ( \
                 SELECT DISTINCT g_id, date(datetime) AS day \
                 FROM detections WHERE datetime < ?1 \
             ), \
             remaining AS ( \
                 SELECT p.g_id AS g_id, p.day AS day, COUNT(d.id) AS events \
                 FROM pruned p \
                 LEFT JOIN detections d \
                   ON d.g_id = p.g_id AND date(d.datetime) = p.day AND d.datetime >= ?1 \
                 GROUP BY p.g_id, p.day \
             ) \
             SELECT r.g_id AS g_id, r.day AS day, COALESCE(s.cadence, 0) AS cadence, r.events AS events \
             FROM remaining r \
             LEFT JOIN daily_stats s ON s.g_id = r.g_id AND s.day = r.day \
             WHERE s.cadence IS NULL OR s.cadence <> r.events \
             LIMIT 1",
        )
        .bind(to_db_text(cutoff))
        .fetch_optional(conn)
        .await
    }

    /// Remove rollup rows on or before `through` whose cadence reached zero.
    pub async fn delete_empty_through(
        conn: &mut SqliteConnection,
        through: Day,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM daily_stats WHERE cadence <= 0 AND day <= ?1")
            .bind(through)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Rows with `from <= day <= to`, ordered by day then type.
    pub async fn in_range<'e, E>(executor: E, from: Day, to: Day) -> Result<Vec<DailyStat>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM daily_stats \
             WHERE day >= ?1 AND day <= ?2 \
             ORDER BY day DESC, type ASC, g_id ASC"
        );
        sqlx::query_as::<_, DailyStat>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(executor)
            .await
    }

    /// Summed cadence per type. Unbounded ends cover all days.
    pub async fn totals_by_type<'e, E>(
        executor: E,
        from: Option<Day>,
        to: Option<Day>,
    ) -> Result<Vec<TypeCount>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TypeCount>(
            "SELECT type, SUM(cadence) AS count FROM daily_stats \
             WHERE (?1 IS NULL OR day >= ?1) AND (?2 IS NULL OR day <= ?2) \
             GROUP BY type \
             ORDER BY type ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await
    }

    /// Summed cadence per day within `from..=to`.
    pub async fn totals_by_day<'e, E>(executor: E, from: Day, to: Day) -> Result<Vec<DayCount>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, DayCount>(
            "SELECT day, SUM(cadence) AS count FROM daily_stats \
             WHERE day >= ?1 AND day <= ?2 \
             GROUP BY day \
             ORDER BY day ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await
    }

    /// Number of distinct g_ids seen within `from..=to`.
    pub async fn distinct_objects<'e, E>(executor: E, from: Day, to: Day) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT g_id) FROM daily_stats WHERE day >= ?1 AND day <= ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Every `(g_id, day)` where the rollup differs from a fresh
    /// `GROUP BY (g_id, date(datetime))` over `detections`.
    pub async fn divergences<'e, E>(executor: E) -> Result<Vec<Divergence>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Divergence>(
            "WITH derived AS ( \
                 SELECT g_id, date(datetime) AS day, COUNT(*) AS events \
                 FROM detections GROUP BY g_id, date(datetime) \
             ) \
             SELECT d.g_id AS g_id, d.day AS day, COALESCE(s.cadence, 0) AS cadence, d.events AS events \
             FROM derived d \
             LEFT JOIN daily_stats s ON s.g_id = d.g_id AND s.day = d.day \
             WHERE s.cadence IS NULL OR s.cadence <> d.events \
             UNION ALL \
             SELECT s.g_id AS g_id, s.day AS day, s.cadence AS cadence, 0 AS events \
             FROM daily_stats s \
             LEFT JOIN derived d ON d.g_id = s.g_id AND d.day = s.day \
             WHERE d.g_id IS NULL",
        )
        .fetch_all(executor)
        .await
    }
}
