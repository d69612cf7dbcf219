//! Per-segment scan worker: pages through one segment, retries
//! throttled pages, and hands item pages to the write stage through a
//! bounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;

use dynocopy_types::item::Item;

use crate::backoff::RetryPolicy;
use crate::client::{ScanCursor, ScanPage, TableStore};
use crate::error::CopyError;
use crate::planner::Segment;
use crate::result::CopyCounts;

/// Result of scanning a single segment to exhaustion.
pub(crate) struct ScanSummary {
    pub items_scanned: u64,
    pub pages: u64,
    pub duration_secs: f64,
}

/// Scan one segment to exhaustion, sending each page downstream.
///
/// The send blocks when the writer's buffer is full, which is the
/// backpressure edge bounding memory use independent of table size.
pub(crate) async fn run_scan_segment(
    store: Arc<dyn TableStore>,
    table: String,
    segment: Segment,
    policy: RetryPolicy,
    sender: mpsc::Sender<Vec<Item>>,
    cancel: Arc<AtomicBool>,
    counts: Arc<Mutex<CopyCounts>>,
) -> Result<ScanSummary, CopyError> {
    let start = Instant::now();
    let mut cursor: Option<ScanCursor> = None;
    let mut items_scanned = 0u64;
    let mut pages = 0u64;

    tracing::debug!(
        table,
        segment = segment.index,
        total_segments = segment.total,
        "Starting segment scan"
    );

    loop {
        let page = fetch_page(
            store.as_ref(),
            &table,
            segment,
            cursor.take(),
            &policy,
            &cancel,
        )
        .await?;

        pages += 1;
        items_scanned += page.items.len() as u64;
        {
            let mut c = counts.lock().map_err(|_| {
                CopyError::Infrastructure(anyhow::anyhow!("copy counters mutex poisoned"))
            })?;
            c.items_scanned += page.items.len() as u64;
        }

        if !page.items.is_empty() && sender.send(page.items).await.is_err() {
            // Receiver gone: the paired writer already failed; its
            // error is what the orchestrator will report.
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "write stage for segment {} closed early",
                segment.index
            )));
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!(
        table,
        segment = segment.index,
        items = items_scanned,
        pages,
        "Segment scan complete"
    );

    Ok(ScanSummary {
        items_scanned,
        pages,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Fetch one page, absorbing retryable errors under the policy.
///
/// Scanning does not mutate, so re-requesting the same page after a
/// throttle is safe. Retry exhaustion escalates to a segment failure.
async fn fetch_page(
    store: &dyn TableStore,
    table: &str,
    segment: Segment,
    cursor: Option<ScanCursor>,
    policy: &RetryPolicy,
    cancel: &AtomicBool,
) -> Result<ScanPage, CopyError> {
    let mut attempt = 0u32;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "segment {} cancelled",
                segment.index
            )));
        }

        match store.scan_segment(table, segment, cursor.clone()).await {
            Ok(page) => return Ok(page),
            Err(err) if err.retryable => {
                attempt += 1;
                if policy.exhausted(attempt) {
                    tracing::error!(
                        table,
                        segment = segment.index,
                        attempts = attempt,
                        code = %err.code,
                        "Scan retry budget exhausted"
                    );
                    return Err(CopyError::Store(err));
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    table,
                    segment = segment.index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = %err.code,
                    "Scan throttled, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(CopyError::Store(err)),
        }
    }
}
