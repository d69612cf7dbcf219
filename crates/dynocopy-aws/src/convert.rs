//! Conversions between the engine's service-neutral model and the
//! DynamoDB SDK's wire types.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types as sdk;

use dynocopy_types::descriptor::{
    EncryptionSpec, IndexKind, IndexProjection, KeyAttribute, KeySchema, KeyType, SecondaryIndex,
    StreamSpec, StreamViewType, TableDescriptor, ThroughputMode,
};
use dynocopy_types::error::StoreError;
use dynocopy_types::item::{AttributeValue, Item};

pub(crate) fn attr_to_sdk(value: AttributeValue) -> sdk::AttributeValue {
    match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s),
        AttributeValue::N(n) => sdk::AttributeValue::N(n),
        AttributeValue::B(b) => sdk::AttributeValue::B(Blob::new(b)),
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(b),
        AttributeValue::Null(b) => sdk::AttributeValue::Null(b),
        AttributeValue::L(l) => sdk::AttributeValue::L(l.into_iter().map(attr_to_sdk).collect()),
        AttributeValue::M(m) => sdk::AttributeValue::M(
            m.into_iter().map(|(k, v)| (k, attr_to_sdk(v))).collect(),
        ),
        AttributeValue::Ss(s) => sdk::AttributeValue::Ss(s),
        AttributeValue::Ns(n) => sdk::AttributeValue::Ns(n),
        AttributeValue::Bs(b) => {
            sdk::AttributeValue::Bs(b.into_iter().map(Blob::new).collect())
        }
    }
}

pub(crate) fn attr_from_sdk(value: sdk::AttributeValue) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s),
        sdk::AttributeValue::N(n) => AttributeValue::N(n),
        sdk::AttributeValue::B(b) => AttributeValue::B(b.into_inner()),
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(b),
        sdk::AttributeValue::Null(b) => AttributeValue::Null(b),
        sdk::AttributeValue::L(l) => AttributeValue::L(
            l.into_iter().map(attr_from_sdk).collect::<Result<_, _>>()?,
        ),
        sdk::AttributeValue::M(m) => AttributeValue::M(
            m.into_iter()
                .map(|(k, v)| attr_from_sdk(v).map(|v| (k, v)))
                .collect::<Result<_, _>>()?,
        ),
        sdk::AttributeValue::Ss(s) => AttributeValue::Ss(s),
        sdk::AttributeValue::Ns(n) => AttributeValue::Ns(n),
        sdk::AttributeValue::Bs(b) => {
            AttributeValue::Bs(b.into_iter().map(Blob::into_inner).collect())
        }
        _ => {
            return Err(StoreError::internal(
                "UnsupportedAttributeType",
                "attribute value uses an unrecognized wire type",
            ))
        }
    })
}

pub(crate) fn item_to_sdk(item: Item) -> HashMap<String, sdk::AttributeValue> {
    item.into_iter().map(|(k, v)| (k, attr_to_sdk(v))).collect()
}

pub(crate) fn item_from_sdk(
    item: HashMap<String, sdk::AttributeValue>,
) -> Result<Item, StoreError> {
    item.into_iter()
        .map(|(k, v)| attr_from_sdk(v).map(|v| (k, v)))
        .collect()
}

fn scalar_type(key_type: KeyType) -> sdk::ScalarAttributeType {
    match key_type {
        KeyType::String => sdk::ScalarAttributeType::S,
        KeyType::Number => sdk::ScalarAttributeType::N,
        KeyType::Binary => sdk::ScalarAttributeType::B,
    }
}

fn key_type_of(name: &str, defs: &[sdk::AttributeDefinition]) -> Result<KeyType, StoreError> {
    let def = defs
        .iter()
        .find(|d| d.attribute_name() == name)
        .ok_or_else(|| {
            StoreError::internal(
                "MalformedResponse",
                format!("no attribute definition for key '{name}'"),
            )
        })?;
    Ok(match def.attribute_type() {
        sdk::ScalarAttributeType::S => KeyType::String,
        sdk::ScalarAttributeType::N => KeyType::Number,
        sdk::ScalarAttributeType::B => KeyType::Binary,
        _ => {
            return Err(StoreError::internal(
                "MalformedResponse",
                format!("unrecognized attribute type for key '{name}'"),
            ))
        }
    })
}

pub(crate) fn key_schema_from_sdk(
    elements: &[sdk::KeySchemaElement],
    defs: &[sdk::AttributeDefinition],
) -> Result<KeySchema, StoreError> {
    let mut partition = None;
    let mut sort = None;
    for element in elements {
        let attr = KeyAttribute::new(
            element.attribute_name(),
            key_type_of(element.attribute_name(), defs)?,
        );
        match element.key_type() {
            sdk::KeyType::Hash => partition = Some(attr),
            sdk::KeyType::Range => sort = Some(attr),
            _ => {
                return Err(StoreError::internal(
                    "MalformedResponse",
                    format!("unrecognized key role for '{}'", element.attribute_name()),
                ))
            }
        }
    }
    let partition = partition.ok_or_else(|| {
        StoreError::internal("MalformedResponse", "key schema has no partition key")
    })?;
    Ok(KeySchema::new(partition, sort))
}

pub(crate) fn key_schema_to_sdk(
    schema: &KeySchema,
) -> Result<Vec<sdk::KeySchemaElement>, BuildError> {
    let mut out = vec![sdk::KeySchemaElement::builder()
        .attribute_name(&schema.partition.name)
        .key_type(sdk::KeyType::Hash)
        .build()?];
    if let Some(sort) = &schema.sort {
        out.push(
            sdk::KeySchemaElement::builder()
                .attribute_name(&sort.name)
                .key_type(sdk::KeyType::Range)
                .build()?,
        );
    }
    Ok(out)
}

/// Attribute definitions for every key attribute the table and its
/// indexes reference, deduplicated by name.
pub(crate) fn attribute_definitions(
    descriptor: &TableDescriptor,
) -> Result<Vec<sdk::AttributeDefinition>, BuildError> {
    let mut by_name: BTreeMap<String, KeyType> = BTreeMap::new();
    let schemas = std::iter::once(&descriptor.key_schema)
        .chain(descriptor.indexes.iter().map(|i| &i.key_schema));
    for schema in schemas {
        by_name
            .entry(schema.partition.name.clone())
            .or_insert(schema.partition.key_type);
        if let Some(sort) = &schema.sort {
            by_name.entry(sort.name.clone()).or_insert(sort.key_type);
        }
    }

    let mut defs = Vec::with_capacity(by_name.len());
    for (name, key_type) in by_name {
        defs.push(
            sdk::AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(scalar_type(key_type))
                .build()?,
        );
    }
    Ok(defs)
}

pub(crate) fn projection_from_sdk(projection: Option<&sdk::Projection>) -> IndexProjection {
    match projection.and_then(|p| p.projection_type()) {
        Some(sdk::ProjectionType::KeysOnly) => IndexProjection::KeysOnly,
        Some(sdk::ProjectionType::Include) => IndexProjection::Include(
            projection
                .map(|p| p.non_key_attributes().to_vec())
                .unwrap_or_default(),
        ),
        _ => IndexProjection::All,
    }
}

fn projection_to_sdk(projection: &IndexProjection) -> sdk::Projection {
    let builder = sdk::Projection::builder();
    match projection {
        IndexProjection::All => builder.projection_type(sdk::ProjectionType::All).build(),
        IndexProjection::KeysOnly => builder
            .projection_type(sdk::ProjectionType::KeysOnly)
            .build(),
        IndexProjection::Include(attrs) => builder
            .projection_type(sdk::ProjectionType::Include)
            .set_non_key_attributes(Some(attrs.clone()))
            .build(),
    }
}

pub(crate) fn provisioned_throughput(
    read_capacity: u64,
    write_capacity: u64,
) -> Result<sdk::ProvisionedThroughput, BuildError> {
    sdk::ProvisionedThroughput::builder()
        .read_capacity_units(read_capacity as i64)
        .write_capacity_units(write_capacity as i64)
        .build()
}

pub(crate) fn global_index_to_sdk(
    index: &SecondaryIndex,
    throughput: ThroughputMode,
) -> Result<sdk::GlobalSecondaryIndex, BuildError> {
    let mut builder = sdk::GlobalSecondaryIndex::builder()
        .index_name(&index.name)
        .set_key_schema(Some(key_schema_to_sdk(&index.key_schema)?))
        .projection(projection_to_sdk(&index.projection));
    if let ThroughputMode::Provisioned {
        read_capacity,
        write_capacity,
    } = throughput
    {
        builder = builder.provisioned_throughput(provisioned_throughput(
            read_capacity,
            write_capacity,
        )?);
    }
    builder.build()
}

pub(crate) fn local_index_to_sdk(
    index: &SecondaryIndex,
) -> Result<sdk::LocalSecondaryIndex, BuildError> {
    sdk::LocalSecondaryIndex::builder()
        .index_name(&index.name)
        .set_key_schema(Some(key_schema_to_sdk(&index.key_schema)?))
        .projection(projection_to_sdk(&index.projection))
        .build()
}

fn view_type_from_sdk(view: &sdk::StreamViewType) -> Option<StreamViewType> {
    match view {
        sdk::StreamViewType::KeysOnly => Some(StreamViewType::KeysOnly),
        sdk::StreamViewType::NewImage => Some(StreamViewType::NewImage),
        sdk::StreamViewType::OldImage => Some(StreamViewType::OldImage),
        sdk::StreamViewType::NewAndOldImages => Some(StreamViewType::NewAndOldImages),
        _ => None,
    }
}

fn view_type_to_sdk(view: StreamViewType) -> sdk::StreamViewType {
    match view {
        StreamViewType::KeysOnly => sdk::StreamViewType::KeysOnly,
        StreamViewType::NewImage => sdk::StreamViewType::NewImage,
        StreamViewType::OldImage => sdk::StreamViewType::OldImage,
        StreamViewType::NewAndOldImages => sdk::StreamViewType::NewAndOldImages,
    }
}

pub(crate) fn stream_from_sdk(spec: &sdk::StreamSpecification) -> StreamSpec {
    StreamSpec {
        enabled: spec.stream_enabled(),
        view_type: spec.stream_view_type().and_then(view_type_from_sdk),
    }
}

pub(crate) fn stream_to_sdk(
    spec: &StreamSpec,
) -> Result<sdk::StreamSpecification, BuildError> {
    sdk::StreamSpecification::builder()
        .stream_enabled(spec.enabled)
        .set_stream_view_type(spec.view_type.map(view_type_to_sdk))
        .build()
}

pub(crate) fn encryption_from_sdk(desc: &sdk::SseDescription) -> EncryptionSpec {
    EncryptionSpec {
        enabled: matches!(
            desc.status(),
            Some(sdk::SseStatus::Enabled) | Some(sdk::SseStatus::Enabling)
        ),
        sse_type: desc.sse_type().map(|t| t.as_str().to_string()),
        kms_key_id: desc.kms_master_key_arn().map(str::to_string),
    }
}

pub(crate) fn sse_to_sdk(spec: &EncryptionSpec) -> sdk::SseSpecification {
    let mut builder = sdk::SseSpecification::builder().enabled(spec.enabled);
    if let Some(sse_type) = &spec.sse_type {
        builder = builder.sse_type(sdk::SseType::from(sse_type.as_str()));
    }
    if let Some(kms_key_id) = &spec.kms_key_id {
        builder = builder.kms_master_key_id(kms_key_id);
    }
    builder.build()
}

fn throughput_from_sdk(desc: &sdk::TableDescription) -> ThroughputMode {
    if let Some(summary) = desc.billing_mode_summary() {
        if summary.billing_mode() == Some(&sdk::BillingMode::PayPerRequest) {
            return ThroughputMode::OnDemand;
        }
    }
    match desc.provisioned_throughput() {
        Some(pt) => {
            let read = pt.read_capacity_units().unwrap_or(0);
            let write = pt.write_capacity_units().unwrap_or(0);
            if read > 0 && write > 0 {
                ThroughputMode::Provisioned {
                    read_capacity: read as u64,
                    write_capacity: write as u64,
                }
            } else {
                ThroughputMode::OnDemand
            }
        }
        None => ThroughputMode::OnDemand,
    }
}

pub(crate) fn descriptor_from_sdk(
    desc: &sdk::TableDescription,
) -> Result<TableDescriptor, StoreError> {
    let name = desc
        .table_name()
        .ok_or_else(|| StoreError::internal("MalformedResponse", "table description has no name"))?
        .to_string();
    let defs = desc.attribute_definitions();
    let key_schema = key_schema_from_sdk(desc.key_schema(), defs)?;

    let mut indexes = Vec::new();
    for gsi in desc.global_secondary_indexes() {
        indexes.push(SecondaryIndex {
            name: gsi.index_name().unwrap_or_default().to_string(),
            kind: IndexKind::Global,
            key_schema: key_schema_from_sdk(gsi.key_schema(), defs)?,
            projection: projection_from_sdk(gsi.projection()),
        });
    }
    for lsi in desc.local_secondary_indexes() {
        indexes.push(SecondaryIndex {
            name: lsi.index_name().unwrap_or_default().to_string(),
            kind: IndexKind::Local,
            key_schema: key_schema_from_sdk(lsi.key_schema(), defs)?,
            projection: projection_from_sdk(lsi.projection()),
        });
    }

    Ok(TableDescriptor {
        name,
        key_schema,
        indexes,
        throughput: throughput_from_sdk(desc),
        tags: BTreeMap::new(),
        encryption: desc.sse_description().map(encryption_from_sdk),
        stream: desc.stream_specification().map(stream_from_sdk),
        arn: desc.table_arn().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_round_trip() {
        let value = AttributeValue::M(
            [
                ("n".to_string(), AttributeValue::N("42".into())),
                (
                    "l".to_string(),
                    AttributeValue::L(vec![
                        AttributeValue::S("x".into()),
                        AttributeValue::B(vec![1, 2, 3]),
                    ]),
                ),
                ("null".to_string(), AttributeValue::Null(true)),
            ]
            .into_iter()
            .collect(),
        );
        let back = attr_from_sdk(attr_to_sdk(value.clone())).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_key_schema_round_trip() {
        let schema = KeySchema::new(
            KeyAttribute::new("id", KeyType::String),
            Some(KeyAttribute::new("ts", KeyType::Number)),
        );
        let elements = key_schema_to_sdk(&schema).unwrap();
        let defs = vec![
            sdk::AttributeDefinition::builder()
                .attribute_name("id")
                .attribute_type(sdk::ScalarAttributeType::S)
                .build()
                .unwrap(),
            sdk::AttributeDefinition::builder()
                .attribute_name("ts")
                .attribute_type(sdk::ScalarAttributeType::N)
                .build()
                .unwrap(),
        ];
        let back = key_schema_from_sdk(&elements, &defs).unwrap();
        assert!(back.is_compatible_with(&schema));
    }

    #[test]
    fn test_attribute_definitions_dedupes_index_keys() {
        let mut descriptor = TableDescriptor::new(
            "t",
            KeySchema::new(KeyAttribute::new("id", KeyType::String), None),
        );
        descriptor.indexes.push(SecondaryIndex {
            name: "by_owner".into(),
            kind: IndexKind::Global,
            key_schema: KeySchema::new(
                KeyAttribute::new("owner", KeyType::String),
                Some(KeyAttribute::new("id", KeyType::String)),
            ),
            projection: IndexProjection::All,
        });
        let defs = attribute_definitions(&descriptor).unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.attribute_name()).collect();
        assert_eq!(names, vec!["id", "owner"]);
    }
}
