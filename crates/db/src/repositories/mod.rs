//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Maintenance writes take `&mut SqliteConnection` so they can only be
//! composed inside a ledger transaction; reads accept any executor.

pub mod daily_stat_repo;
pub mod detection_repo;

pub use daily_stat_repo::DailyStatRepo;
pub use detection_repo::DetectionRepo;
