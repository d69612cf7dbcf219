//! DynamoDB-backed implementation of the engine's [`TableStore`]
//! boundary.
//!
//! One method per service call; retry and backoff decisions live in
//! the engine, so every error here is classified but never retried.

mod convert;
mod error;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::types as sdk;
use aws_sdk_dynamodb::Client;

use dynocopy_engine::{CreateOutcome, ScanCursor, ScanPage, Segment, TableStore};
use dynocopy_types::descriptor::{
    EncryptionSpec, IndexKind, StreamSpec, TableDescriptor, ThroughputMode,
};
use dynocopy_types::error::{StoreError, StoreErrorKind};
use dynocopy_types::item::Item;

use crate::error::{classify, from_build};

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(10);
const ACTIVE_POLL_ATTEMPTS: u32 = 100;

/// A [`TableStore`] backed by a DynamoDB client.
pub struct DynamoTableStore {
    client: Client,
}

impl DynamoTableStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a store from the ambient AWS environment: profile
    /// configuration, environment variables, or an instance role.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    async fn list_tags(&self, arn: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let mut tags = BTreeMap::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut out = self
                .client
                .list_tags_of_resource()
                .resource_arn(arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListTagsOfResource", e))?;
            if let Some(batch) = out.tags.take() {
                for tag in batch {
                    tags.insert(tag.key, tag.value);
                }
            }
            next_token = out.next_token.take();
            if next_token.is_none() {
                break;
            }
        }
        Ok(tags)
    }

    async fn table_arn(&self, table: &str) -> Result<String, StoreError> {
        let out = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify("DescribeTable", e))?;
        out.table.and_then(|t| t.table_arn).ok_or_else(|| {
            StoreError::internal(
                "MalformedResponse",
                format!("no resource identifier for table '{table}'"),
            )
        })
    }
}

#[async_trait]
impl TableStore for DynamoTableStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescriptor, StoreError> {
        let out = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify("DescribeTable", e))?;
        let desc = out.table.ok_or_else(|| {
            StoreError::internal(
                "MalformedResponse",
                format!("empty description for table '{table}'"),
            )
        })?;
        let mut descriptor = convert::descriptor_from_sdk(&desc)?;

        if let Some(arn) = descriptor.arn.clone() {
            // Tags are advisory metadata; a copy must not fail because
            // the caller lacks ListTagsOfResource.
            match self.list_tags(&arn).await {
                Ok(tags) => descriptor.tags = tags,
                Err(err) => {
                    tracing::warn!(table, error = %err, "Could not list table tags, continuing without them");
                }
            }
        }
        Ok(descriptor)
    }

    async fn scan_segment(
        &self,
        table: &str,
        segment: Segment,
        cursor: Option<ScanCursor>,
    ) -> Result<ScanPage, StoreError> {
        let mut req = self
            .client
            .scan()
            .table_name(table)
            .segment(segment.index as i32)
            .total_segments(segment.total as i32);
        if let Some(cursor) = cursor {
            req = req.set_exclusive_start_key(Some(convert::item_to_sdk(cursor.into_token())));
        }
        let mut out = req.send().await.map_err(|e| classify("Scan", e))?;

        let mut items = Vec::new();
        for raw in out.items.take().unwrap_or_default() {
            items.push(convert::item_from_sdk(raw)?);
        }
        let next_cursor = match out.last_evaluated_key.take() {
            Some(key) if !key.is_empty() => Some(ScanCursor::new(convert::item_from_sdk(key)?)),
            _ => None,
        };
        Ok(ScanPage { items, next_cursor })
    }

    async fn batch_write(&self, table: &str, items: Vec<Item>) -> Result<Vec<Item>, StoreError> {
        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let put = sdk::PutRequest::builder()
                .set_item(Some(convert::item_to_sdk(item)))
                .build()
                .map_err(from_build)?;
            requests.push(sdk::WriteRequest::builder().put_request(put).build());
        }

        let mut out = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| classify("BatchWriteItem", e))?;

        let mut unprocessed = Vec::new();
        if let Some(mut by_table) = out.unprocessed_items.take() {
            for request in by_table.remove(table).unwrap_or_default() {
                if let Some(put) = request.put_request {
                    unprocessed.push(convert::item_from_sdk(put.item)?);
                }
            }
        }
        Ok(unprocessed)
    }

    async fn create_table(
        &self,
        descriptor: &TableDescriptor,
    ) -> Result<CreateOutcome, StoreError> {
        let mut builder = self
            .client
            .create_table()
            .table_name(&descriptor.name)
            .set_attribute_definitions(Some(
                convert::attribute_definitions(descriptor).map_err(from_build)?,
            ))
            .set_key_schema(Some(
                convert::key_schema_to_sdk(&descriptor.key_schema).map_err(from_build)?,
            ));

        builder = match descriptor.throughput {
            ThroughputMode::Provisioned {
                read_capacity,
                write_capacity,
            } => builder
                .billing_mode(sdk::BillingMode::Provisioned)
                .provisioned_throughput(
                    convert::provisioned_throughput(read_capacity, write_capacity)
                        .map_err(from_build)?,
                ),
            ThroughputMode::OnDemand => builder.billing_mode(sdk::BillingMode::PayPerRequest),
        };

        for index in &descriptor.indexes {
            builder = match index.kind {
                IndexKind::Global => builder.global_secondary_indexes(
                    convert::global_index_to_sdk(index, descriptor.throughput)
                        .map_err(from_build)?,
                ),
                IndexKind::Local => builder
                    .local_secondary_indexes(convert::local_index_to_sdk(index).map_err(from_build)?),
            };
        }

        if let Some(encryption) = &descriptor.encryption {
            builder = builder.sse_specification(convert::sse_to_sdk(encryption));
        }

        match builder.send().await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(err) if err.code() == Some("ResourceInUseException") => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(classify("CreateTable", err)),
        }
    }

    async fn wait_until_active(&self, table: &str) -> Result<(), StoreError> {
        for attempt in 1..=ACTIVE_POLL_ATTEMPTS {
            match self.client.describe_table().table_name(table).send().await {
                Ok(out) => {
                    let status = out.table.as_ref().and_then(|t| t.table_status());
                    if status == Some(&sdk::TableStatus::Active) {
                        return Ok(());
                    }
                    tracing::debug!(table, attempt, status = ?status, "Table not yet active");
                }
                Err(err) => {
                    let classified = classify("DescribeTable", err);
                    // A freshly created table can briefly describe as
                    // missing; anything else fatal ends the wait.
                    if classified.is_fatal() && classified.kind != StoreErrorKind::NotFound {
                        return Err(classified);
                    }
                    tracing::debug!(table, attempt, error = %classified, "Describe failed while waiting, will retry");
                }
            }
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
        Err(StoreError::internal(
            "TableNotActive",
            format!("table '{table}' did not become active in time"),
        ))
    }

    async fn update_tags(
        &self,
        table: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        if tags.is_empty() {
            return Ok(());
        }
        let arn = self.table_arn(table).await?;
        let mut sdk_tags = Vec::with_capacity(tags.len());
        for (key, value) in tags {
            sdk_tags.push(
                sdk::Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(from_build)?,
            );
        }
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(sdk_tags))
            .send()
            .await
            .map_err(|e| classify("TagResource", e))?;
        Ok(())
    }

    async fn update_stream_spec(&self, table: &str, spec: &StreamSpec) -> Result<(), StoreError> {
        if !spec.enabled {
            // A newly created table already has no stream; enabling is
            // the only transition to replicate.
            return Ok(());
        }
        self.client
            .update_table()
            .table_name(table)
            .stream_specification(convert::stream_to_sdk(spec).map_err(from_build)?)
            .send()
            .await
            .map_err(|e| classify("UpdateTable", e))?;
        Ok(())
    }

    async fn describe_encryption(&self, table: &str) -> Result<Option<EncryptionSpec>, StoreError> {
        let out = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify("DescribeTable", e))?;
        Ok(out
            .table
            .and_then(|t| t.sse_description)
            .map(|d| convert::encryption_from_sdk(&d)))
    }
}
