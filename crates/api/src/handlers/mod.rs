pub mod detections;
pub mod stats;
