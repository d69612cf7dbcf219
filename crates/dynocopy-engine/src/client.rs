//! The `TableStore` boundary: everything the engine asks of the
//! wrapped table service.
//!
//! Implementations live outside this crate (the AWS client in
//! `dynocopy-aws`, in-memory fakes in tests); the engine only ever
//! sees this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use dynocopy_types::descriptor::{EncryptionSpec, StreamSpec, TableDescriptor};
use dynocopy_types::error::StoreError;
use dynocopy_types::item::Item;

use crate::planner::Segment;

/// Opaque continuation token returned by a scan page.
///
/// Carried only within one segment's scan loop and handed back
/// verbatim; the engine never inspects it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCursor(Item);

impl ScanCursor {
    pub fn new(token: Item) -> Self {
        Self(token)
    }

    pub fn token(&self) -> &Item {
        &self.0
    }

    pub fn into_token(self) -> Item {
        self.0
    }
}

/// One page of a segment scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// `None` once the segment is exhausted.
    pub next_cursor: Option<ScanCursor>,
}

/// Outcome of a create-table call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Async interface to the wrapped table service.
///
/// Every method maps to exactly one service operation; retry and
/// backoff live in the engine, not behind this trait.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch a table's descriptor, or `NotFound`.
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor, StoreError>;

    /// Read one page of the given segment, resuming from `cursor`.
    async fn scan_segment(
        &self,
        table: &str,
        segment: Segment,
        cursor: Option<ScanCursor>,
    ) -> Result<ScanPage, StoreError>;

    /// Submit a write batch; returns the items the service rejected
    /// (typically due to throttling) for resubmission.
    async fn batch_write(&self, table: &str, items: Vec<Item>) -> Result<Vec<Item>, StoreError>;

    /// Create a table from a descriptor. Creation is never
    /// destructive: an existing table reports `AlreadyExists`.
    async fn create_table(&self, descriptor: &TableDescriptor)
        -> Result<CreateOutcome, StoreError>;

    /// Block until the table reaches its active/ready state.
    async fn wait_until_active(&self, table: &str) -> Result<(), StoreError>;

    /// Replace the table's tag set (verbose copy only).
    async fn update_tags(
        &self,
        table: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Update the table's change-stream settings (verbose copy only).
    async fn update_stream_spec(&self, table: &str, spec: &StreamSpec) -> Result<(), StoreError>;

    /// Read the table's encryption settings (verbose copy only).
    async fn describe_encryption(&self, table: &str) -> Result<Option<EncryptionSpec>, StoreError>;
}
