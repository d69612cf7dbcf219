//! Core orchestration crate for dynocopy table-copy execution.

pub mod backoff;
pub mod client;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod result;

mod scanner;
mod schema;
mod writer;

// Re-export public API for convenience
pub use client::{CreateOutcome, ScanCursor, ScanPage, TableStore};
pub use error::CopyError;
pub use orchestrator::{run_copy, CopyConfig};
pub use planner::{plan_segments, Segment};
pub use result::{CopyCounts, CopyReport, JobStatus, SegmentFailure, SegmentMetric};
