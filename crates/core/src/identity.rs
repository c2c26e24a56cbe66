//! G_ID generation.
//!
//! A G_ID has the form `COLOR_LABEL_TIMESTAMP`, where the label is
//! upper-cased with each whitespace character replaced by `_` and the timestamp is
//! milliseconds since the Unix epoch. Because the generation time is part of
//! the identity, two sightings of the same physical object get different
//! G_IDs unless they are generated in the same millisecond.

use crate::types::Timestamp;

/// Upper-case `label`, mapping every whitespace character to `_`.
///
/// Runs are not collapsed and nothing is trimmed.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_uppercase()
}

/// Build the G_ID for a detection of `color`/`label` generated at `at`.
pub fn resolve_g_id(color: &str, label: &str, at: Timestamp) -> String {
    format!(
        "{}_{}_{}",
        normalize_label(color),
        normalize_label(label),
        at.timestamp_millis()
    )
}
