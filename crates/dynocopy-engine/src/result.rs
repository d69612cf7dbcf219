//! Copy-job result types and per-segment metrics.

use std::fmt;

/// Aggregate item counters for a copy run.
///
/// The single piece of mutable state shared across workers, updated
/// behind a mutex as pages and batches complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyCounts {
    pub items_scanned: u64,
    pub items_written: u64,
    pub items_failed: u64,
}

/// Terminal status of a copy job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Every scanned item was written.
    Succeeded,
    /// The job ran to completion but some items or segments failed.
    PartiallyFailed,
    /// A fatal error short-circuited the run.
    Aborted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Per-segment metrics for skew analysis.
#[derive(Debug, Clone)]
pub struct SegmentMetric {
    pub segment_index: u32,
    pub items_scanned: u64,
    pub items_written: u64,
    pub items_failed: u64,
    pub pages: u64,
    pub batches: u64,
    pub scan_duration_secs: f64,
    pub write_duration_secs: f64,
}

/// A segment that terminated with a non-fatal error.
#[derive(Debug, Clone)]
pub struct SegmentFailure {
    pub segment_index: u32,
    pub error: String,
}

/// Result of a copy run that was not aborted.
#[derive(Debug, Clone)]
pub struct CopyReport {
    pub status: JobStatus,
    pub counts: CopyCounts,
    pub duration_secs: f64,
    pub parallelism: u32,
    pub segments: Vec<SegmentMetric>,
    pub segment_failures: Vec<SegmentFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(JobStatus::PartiallyFailed.to_string(), "partially_failed");
        assert_eq!(JobStatus::Aborted.to_string(), "aborted");
    }
}
