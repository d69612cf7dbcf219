//! Schema replication preflight: validates or creates the target
//! table before any data moves, establishing the happens-before edge
//! between metadata and data copy.

use dynocopy_types::descriptor::TableDescriptor;
use dynocopy_types::error::{StoreError, StoreErrorKind};

use crate::client::{CreateOutcome, TableStore};
use crate::error::CopyError;
use crate::orchestrator::CopyConfig;

/// Describe the source, then make the target ready: verify key-schema
/// compatibility when it exists, create it (honoring `--create-table`
/// and `--verbose-copy`) when it does not.
///
/// Returns the source descriptor; on success the target is active and
/// safe to write to.
pub(crate) async fn replicate_schema(
    store: &dyn TableStore,
    config: &CopyConfig,
) -> Result<TableDescriptor, CopyError> {
    let source = store
        .describe_table(&config.source)
        .await
        .map_err(|err| match err.kind {
            StoreErrorKind::NotFound => StoreError::not_found(
                err.code,
                format!("source table '{}' does not exist", config.source),
            ),
            _ => err,
        })?;

    match store.describe_table(&config.target).await {
        Ok(existing) => {
            if !source.key_schema.is_compatible_with(&existing.key_schema) {
                return Err(CopyError::Store(StoreError::schema_mismatch(
                    "KEY_SCHEMA_MISMATCH",
                    format!(
                        "target table '{}' exists with a key schema incompatible with '{}'",
                        config.target, config.source
                    ),
                )));
            }
            tracing::info!(table = config.target, "Target table found, skipping creation");
        }
        Err(err) if err.kind == StoreErrorKind::NotFound => {
            if !config.create_table {
                return Err(CopyError::Store(StoreError::not_found(
                    "TARGET_TABLE_MISSING",
                    format!(
                        "target table '{}' does not exist; pass --create-table to create it",
                        config.target
                    ),
                )));
            }
            create_target(store, config, &source).await?;
        }
        Err(err) => return Err(CopyError::Store(err)),
    }

    Ok(source)
}

async fn create_target(
    store: &dyn TableStore,
    config: &CopyConfig,
    source: &TableDescriptor,
) -> Result<(), CopyError> {
    let mut descriptor = source.for_clone(&config.target);
    if config.verbose_copy {
        descriptor.encryption = store.describe_encryption(&config.source).await?;
    }

    tracing::info!(table = config.target, "Creating target table");
    match store.create_table(&descriptor).await? {
        CreateOutcome::Created => {
            tracing::info!(table = config.target, "Waiting for target table to become active");
        }
        CreateOutcome::AlreadyExists => {
            tracing::info!(table = config.target, "Target table appeared concurrently, reusing");
        }
    }
    store.wait_until_active(&config.target).await?;

    if config.verbose_copy {
        let mut tags = source.tags.clone();
        tags.insert(
            "dynocopy:source-table".to_string(),
            source.arn.clone().unwrap_or_else(|| source.name.clone()),
        );
        store.update_tags(&config.target, &tags).await?;

        if let Some(stream) = &source.stream {
            store.update_stream_spec(&config.target, stream).await?;
        }
    }

    Ok(())
}
