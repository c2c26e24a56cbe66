//! Row structs, insert DTOs and aggregate views.

pub mod daily_stat;
pub mod detection;
