//! Copy-job orchestrator: validates configuration, runs the schema
//! preflight, spawns one scan/write pair per segment, and aggregates
//! the final report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use dynocopy_types::item::Item;

use crate::backoff::RetryPolicy;
use crate::client::TableStore;
use crate::error::CopyError;
use crate::planner::{plan_segments, Segment};
use crate::result::{CopyCounts, CopyReport, JobStatus, SegmentFailure, SegmentMetric};
use crate::scanner::{run_scan_segment, ScanSummary};
use crate::schema::replicate_schema;
use crate::writer::{run_write_batcher, WriteSummary};

const DEFAULT_PARALLELISM: u32 = 5;
const DEFAULT_CHANNEL_CAPACITY: usize = 4;
/// Service limit on TotalSegments for a parallel scan. Keeping
/// parallelism within it also keeps the segment index safely inside
/// the wire type's i32 range.
const MAX_PARALLELISM: u32 = 1_000_000;

/// Configuration for one copy job.
#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub source: String,
    pub target: String,
    /// Number of parallel scan segments.
    pub parallelism: u32,
    /// Create the target table when it does not exist.
    pub create_table: bool,
    /// Also replicate tags, encryption, and stream settings.
    pub verbose_copy: bool,
    /// Backoff policy applied to throttled scan and write calls.
    pub retry: RetryPolicy,
    /// In-flight page budget per segment (scan-to-write channel
    /// capacity); bounds memory under a throttled target.
    pub channel_capacity: usize,
}

impl CopyConfig {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            parallelism: DEFAULT_PARALLELISM,
            create_table: false,
            verbose_copy: false,
            retry: RetryPolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    fn validate(&self) -> Result<(), CopyError> {
        if self.source.is_empty() || self.target.is_empty() {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "source and target table names must be non-empty"
            )));
        }
        if self.source == self.target {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "source and target must be different tables (both are '{}')",
                self.source
            )));
        }
        if self.parallelism == 0 {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "parallelism must be at least 1"
            )));
        }
        if self.parallelism > MAX_PARALLELISM {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "parallelism {} exceeds the service limit of {} scan segments",
                self.parallelism,
                MAX_PARALLELISM
            )));
        }
        if self.channel_capacity == 0 {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "channel capacity must be at least 1"
            )));
        }
        Ok(())
    }
}

struct SegmentResult {
    segment: Segment,
    scan: ScanSummary,
    write: WriteSummary,
}

struct SegmentTaskCollection {
    successes: Vec<SegmentResult>,
    segment_failures: Vec<SegmentFailure>,
    first_fatal: Option<CopyError>,
}

/// Run a full copy: schema preflight, then parallel segmented
/// scan-and-write, then drain.
///
/// # Errors
///
/// Returns a `CopyError` when the configuration is invalid or a fatal
/// error aborts the run; non-fatal segment failures surface in the
/// report as `PartiallyFailed` instead.
pub async fn run_copy(
    store: Arc<dyn TableStore>,
    config: &CopyConfig,
) -> Result<CopyReport, CopyError> {
    let start = Instant::now();
    config.validate()?;

    tracing::info!(
        source = config.source,
        target = config.target,
        parallelism = config.parallelism,
        create_table = config.create_table,
        verbose_copy = config.verbose_copy,
        "Starting table copy"
    );

    // Schema replication must finish, and the target must be active,
    // before any worker is spawned.
    let source_descriptor = replicate_schema(store.as_ref(), config).await?;

    let segments = plan_segments(config.parallelism)?;
    let counts = Arc::new(Mutex::new(CopyCounts::default()));
    let cancel = Arc::new(AtomicBool::new(false));

    let mut join_set: JoinSet<(u32, Result<SegmentResult, CopyError>)> = JoinSet::new();
    for segment in segments {
        let store = store.clone();
        let source = config.source.clone();
        let target = config.target.clone();
        let key_schema = source_descriptor.key_schema.clone();
        let policy = config.retry;
        let capacity = config.channel_capacity;
        let cancel = cancel.clone();
        let counts = counts.clone();

        join_set.spawn(async move {
            let result = run_segment(
                store, source, target, segment, key_schema, policy, capacity, cancel, counts,
            )
            .await;
            (segment.index, result)
        });
    }

    let collection = collect_segment_results(join_set, &cancel).await?;

    if let Some(fatal) = collection.first_fatal {
        tracing::error!(error = %fatal, "Copy aborted by fatal error");
        return Err(fatal);
    }

    let final_counts = *counts
        .lock()
        .map_err(|_| CopyError::Infrastructure(anyhow::anyhow!("copy counters mutex poisoned")))?;

    let mut segment_metrics: Vec<SegmentMetric> = collection
        .successes
        .iter()
        .map(|sr| SegmentMetric {
            segment_index: sr.segment.index,
            items_scanned: sr.scan.items_scanned,
            items_written: sr.write.items_written,
            items_failed: sr.write.items_failed,
            pages: sr.scan.pages,
            batches: sr.write.batches,
            scan_duration_secs: sr.scan.duration_secs,
            write_duration_secs: sr.write.duration_secs,
        })
        .collect();
    segment_metrics.sort_by_key(|m| m.segment_index);
    let mut segment_failures = collection.segment_failures;
    segment_failures.sort_by_key(|f| f.segment_index);

    let status = if segment_failures.is_empty() && final_counts.items_failed == 0 {
        JobStatus::Succeeded
    } else {
        JobStatus::PartiallyFailed
    };

    let duration = start.elapsed();
    tracing::info!(
        source = config.source,
        target = config.target,
        status = %status,
        items_scanned = final_counts.items_scanned,
        items_written = final_counts.items_written,
        items_failed = final_counts.items_failed,
        duration_secs = duration.as_secs_f64(),
        "Copy run completed"
    );

    Ok(CopyReport {
        status,
        counts: final_counts,
        duration_secs: duration.as_secs_f64(),
        parallelism: config.parallelism,
        segments: segment_metrics,
        segment_failures,
    })
}

/// Run the scan and write halves of one segment to completion.
///
/// The halves are separate tasks so a slow write (throttled target)
/// blocks the scan only through the channel, never the executor.
#[allow(clippy::too_many_arguments)]
async fn run_segment(
    store: Arc<dyn TableStore>,
    source: String,
    target: String,
    segment: Segment,
    key_schema: dynocopy_types::descriptor::KeySchema,
    policy: RetryPolicy,
    capacity: usize,
    cancel: Arc<AtomicBool>,
    counts: Arc<Mutex<CopyCounts>>,
) -> Result<SegmentResult, CopyError> {
    let (tx, rx) = mpsc::channel::<Vec<Item>>(capacity);

    let scan_handle = tokio::spawn(run_scan_segment(
        store.clone(),
        source,
        segment,
        policy,
        tx,
        cancel.clone(),
        counts.clone(),
    ));
    let write_handle = tokio::spawn(run_write_batcher(
        store,
        target,
        segment,
        key_schema,
        policy,
        rx,
        cancel,
        counts,
    ));

    let scan = scan_handle.await.map_err(|e| {
        CopyError::Infrastructure(anyhow::anyhow!(
            "scan task panicked for segment {}: {e}",
            segment.index
        ))
    })?;
    let write = write_handle.await.map_err(|e| {
        CopyError::Infrastructure(anyhow::anyhow!(
            "write task panicked for segment {}: {e}",
            segment.index
        ))
    })?;

    match (scan, write) {
        (Ok(scan), Ok(write)) => Ok(SegmentResult {
            segment,
            scan,
            write,
        }),
        // The writer's error wins: when it fails first the scanner
        // only observes a closed channel.
        (_, Err(write_err)) => Err(write_err),
        (Err(scan_err), Ok(_)) => Err(scan_err),
    }
}

/// Wait for every segment task. A fatal error sets the cancel flag and
/// aborts the rest; non-fatal segment failures are recorded and the
/// remaining segments run to completion.
async fn collect_segment_results(
    mut join_set: JoinSet<(u32, Result<SegmentResult, CopyError>)>,
    cancel: &AtomicBool,
) -> Result<SegmentTaskCollection, CopyError> {
    let mut successes = Vec::new();
    let mut segment_failures = Vec::new();
    let mut first_fatal: Option<CopyError> = None;

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((_, Ok(sr))) => successes.push(sr),
            Ok((index, Err(err))) if err.is_fatal() => {
                tracing::error!(segment = index, "Segment failed fatally: {}", err);
                if first_fatal.is_none() {
                    cancel.store(true, Ordering::Relaxed);
                    first_fatal = Some(err);
                    join_set.abort_all();
                }
            }
            Ok((index, Err(err))) => {
                tracing::error!(segment = index, "Segment failed: {}", err);
                segment_failures.push(SegmentFailure {
                    segment_index: index,
                    error: err.to_string(),
                });
            }
            Err(join_err) if join_err.is_cancelled() && first_fatal.is_some() => {
                // Expected: sibling tasks aborted after the first fatal error.
            }
            Err(join_err) => {
                return Err(CopyError::Infrastructure(anyhow::anyhow!(
                    "segment task panicked: {join_err}"
                )));
            }
        }
    }

    Ok(SegmentTaskCollection {
        successes,
        segment_failures,
        first_fatal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_same_source_and_target() {
        let config = CopyConfig::new("prod_table", "prod_table");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let mut config = CopyConfig::new("a", "b");
        config.parallelism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_parallelism_over_service_limit() {
        let mut config = CopyConfig::new("a", "b");
        config.parallelism = MAX_PARALLELISM;
        assert!(config.validate().is_ok());
        config.parallelism = MAX_PARALLELISM + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let config = CopyConfig::new("", "b");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config = CopyConfig::new("a", "b");
        assert!(config.validate().is_ok());
        assert_eq!(config.parallelism, 5);
    }
}
