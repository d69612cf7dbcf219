//! Per-segment write batcher: groups incoming items into
//! service-sized batches, resubmits the unprocessed subset with
//! backoff, and counts items failed after retry exhaustion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;

use dynocopy_types::descriptor::KeySchema;
use dynocopy_types::item::{key_string, Item};

use crate::backoff::RetryPolicy;
use crate::client::TableStore;
use crate::error::CopyError;
use crate::planner::Segment;
use crate::result::CopyCounts;

/// Service limit on items per batch-write call.
pub(crate) const MAX_BATCH_ITEMS: usize = 25;

/// Result of draining one segment's write path.
pub(crate) struct WriteSummary {
    pub items_written: u64,
    pub items_failed: u64,
    pub batches: u64,
    pub duration_secs: f64,
}

struct BatchOutcome {
    written: u64,
    failed: u64,
}

/// Drain one segment's item channel into the target table.
///
/// Items buffered here are bounded by the channel capacity times the
/// page size; the channel blocking its sender is what slows the scan
/// when the target throttles persistently.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_write_batcher(
    store: Arc<dyn TableStore>,
    table: String,
    segment: Segment,
    key_schema: KeySchema,
    policy: RetryPolicy,
    mut receiver: mpsc::Receiver<Vec<Item>>,
    cancel: Arc<AtomicBool>,
    counts: Arc<Mutex<CopyCounts>>,
) -> Result<WriteSummary, CopyError> {
    let start = Instant::now();
    let mut buffer: Vec<Item> = Vec::new();
    let mut items_written = 0u64;
    let mut items_failed = 0u64;
    let mut batches = 0u64;

    while let Some(page) = receiver.recv().await {
        buffer.extend(page);
        while buffer.len() >= MAX_BATCH_ITEMS {
            let batch: Vec<Item> = buffer.drain(..MAX_BATCH_ITEMS).collect();
            let outcome = submit_batch(
                store.as_ref(),
                &table,
                segment,
                &key_schema,
                batch,
                &policy,
                &cancel,
                &counts,
            )
            .await?;
            batches += 1;
            items_written += outcome.written;
            items_failed += outcome.failed;
        }
    }

    // Channel closed: the scan finished (or failed); flush the tail.
    while !buffer.is_empty() {
        let take = buffer.len().min(MAX_BATCH_ITEMS);
        let batch: Vec<Item> = buffer.drain(..take).collect();
        let outcome = submit_batch(
            store.as_ref(),
            &table,
            segment,
            &key_schema,
            batch,
            &policy,
            &cancel,
            &counts,
        )
        .await?;
        batches += 1;
        items_written += outcome.written;
        items_failed += outcome.failed;
    }

    tracing::debug!(
        table,
        segment = segment.index,
        items = items_written,
        failed = items_failed,
        batches,
        "Segment write complete"
    );

    Ok(WriteSummary {
        items_written,
        items_failed,
        batches,
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Submit one batch, resubmitting only the unprocessed subset until it
/// drains or the retry budget runs out.
///
/// Exhaustion records the remainder as failed items without failing
/// the segment; only a fatal store error propagates.
#[allow(clippy::too_many_arguments)]
async fn submit_batch(
    store: &dyn TableStore,
    table: &str,
    segment: Segment,
    key_schema: &KeySchema,
    batch: Vec<Item>,
    policy: &RetryPolicy,
    cancel: &AtomicBool,
    counts: &Mutex<CopyCounts>,
) -> Result<BatchOutcome, CopyError> {
    // The service rejects duplicate keys within one call; overwrite
    // semantics make keeping only the last occurrence equivalent.
    let mut pending = dedupe_by_key(batch, key_schema);
    let submitted = pending.len() as u64;
    let mut attempt = 0u32;

    let outcome = loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(CopyError::Infrastructure(anyhow::anyhow!(
                "segment {} cancelled",
                segment.index
            )));
        }

        let result = store.batch_write(table, pending.clone()).await;
        let unprocessed = match result {
            Ok(unprocessed) => unprocessed,
            Err(err) if err.retryable => {
                attempt += 1;
                if policy.exhausted(attempt) {
                    tracing::warn!(
                        table,
                        segment = segment.index,
                        failed = pending.len(),
                        code = %err.code,
                        "Write retry budget exhausted, recording items as failed"
                    );
                    break BatchOutcome {
                        written: submitted - pending.len() as u64,
                        failed: pending.len() as u64,
                    };
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    table,
                    segment = segment.index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = %err.code,
                    "Batch write throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(err) => return Err(CopyError::Store(err)),
        };

        if unprocessed.is_empty() {
            break BatchOutcome {
                written: submitted,
                failed: 0,
            };
        }

        attempt += 1;
        if policy.exhausted(attempt) {
            tracing::warn!(
                table,
                segment = segment.index,
                failed = unprocessed.len(),
                "Unprocessed items remain after retry budget, recording as failed"
            );
            break BatchOutcome {
                written: submitted - unprocessed.len() as u64,
                failed: unprocessed.len() as u64,
            };
        }
        let delay = policy.delay_for(attempt);
        tracing::debug!(
            table,
            segment = segment.index,
            attempt,
            unprocessed = unprocessed.len(),
            delay_ms = delay.as_millis() as u64,
            "Resubmitting unprocessed items"
        );
        pending = unprocessed;
        tokio::time::sleep(delay).await;
    };

    {
        let mut c = counts.lock().map_err(|_| {
            CopyError::Infrastructure(anyhow::anyhow!("copy counters mutex poisoned"))
        })?;
        c.items_written += outcome.written;
        c.items_failed += outcome.failed;
    }
    Ok(outcome)
}

/// Keep the last occurrence of each primary key, preserving order of
/// first appearance; items without an extractable key pass through.
fn dedupe_by_key(items: Vec<Item>, key_schema: &KeySchema) -> Vec<Item> {
    let mut out: Vec<Item> = Vec::with_capacity(items.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for item in items {
        match key_string(&item, key_schema) {
            Some(key) => {
                if let Some(&slot) = seen.get(&key) {
                    out[slot] = item;
                } else {
                    seen.insert(key, out.len());
                    out.push(item);
                }
            }
            None => out.push(item),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynocopy_types::descriptor::{KeyAttribute, KeyType};
    use dynocopy_types::item::AttributeValue;

    fn item(id: &str, payload: &str) -> Item {
        [
            ("id".to_string(), AttributeValue::S(id.to_string())),
            ("payload".to_string(), AttributeValue::S(payload.to_string())),
        ]
        .into_iter()
        .collect()
    }

    fn schema() -> KeySchema {
        KeySchema::new(KeyAttribute::new("id", KeyType::String), None)
    }

    #[test]
    fn test_dedupe_keeps_last_occurrence() {
        let items = vec![item("a", "v1"), item("b", "v1"), item("a", "v2")];
        let deduped = dedupe_by_key(items, &schema());
        assert_eq!(deduped.len(), 2);
        assert_eq!(
            deduped[0].get("payload"),
            Some(&AttributeValue::S("v2".into()))
        );
        assert_eq!(
            deduped[1].get("payload"),
            Some(&AttributeValue::S("v1".into()))
        );
    }

    #[test]
    fn test_dedupe_passes_unkeyed_items_through() {
        let mut no_key = Item::new();
        no_key.insert("other".into(), AttributeValue::Bool(true));
        let items = vec![no_key.clone(), no_key];
        let deduped = dedupe_by_key(items, &schema());
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_dedupe_distinct_keys_unchanged() {
        let items: Vec<Item> = (0..5).map(|i| item(&format!("k{i}"), "v")).collect();
        assert_eq!(dedupe_by_key(items.clone(), &schema()), items);
    }
}
