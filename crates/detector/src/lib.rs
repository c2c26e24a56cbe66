//! `chromatrack-detector` library crate.
//!
//! Concrete collaborators for the detection pipeline: an image-backed frame
//! source, a PNG overlay writer, and an HTTP ledger client. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod overlay;
pub mod sender;
pub mod source;
