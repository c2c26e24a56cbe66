//! Text encoding of ledger timestamps.
//!
//! `detections.datetime` is stored as fixed-width UTC text
//! (`YYYY-MM-DDTHH:MM:SS.mmmZ`) so that string comparison orders rows by time
//! and SQLite's `date()` yields the same day as [`day_of`].

use chromatrack_core::types::{Day, Timestamp};
use chrono::SecondsFormat;

/// Encode a timestamp for the `datetime` column.
pub fn to_db_text(at: Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The UTC calendar day a timestamp falls on.
pub fn day_of(at: Timestamp) -> Day {
    at.date_naive()
}
