//! Pure detection logic shared by the pipeline, ledger and API crates.
//!
//! Nothing in this crate performs I/O: colour matching, block extraction,
//! grouping and identity generation are all plain functions over values.

pub mod color;
pub mod error;
pub mod extraction;
pub mod grouping;
pub mod identity;
pub mod paging;
pub mod submission;
pub mod types;
