//! Table metadata: key schemas, secondary indexes, throughput, and
//! the optional settings replicated by a verbose copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    String,
    Number,
    Binary,
}

/// A key attribute definition (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

/// Primary key schema: partition key plus optional sort key.
///
/// Immutable for the lifetime of a table; a copy between tables with
/// differing key schemas is rejected before any data moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition: KeyAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<KeyAttribute>,
}

impl KeySchema {
    pub fn new(partition: KeyAttribute, sort: Option<KeyAttribute>) -> Self {
        Self { partition, sort }
    }

    /// Whether two schemas agree on key attribute names and types.
    pub fn is_compatible_with(&self, other: &KeySchema) -> bool {
        self.partition == other.partition && self.sort == other.sort
    }
}

/// Attribute projection of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexProjection {
    All,
    KeysOnly,
    Include(Vec<String>),
}

/// Whether a secondary index is global or local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Global,
    Local,
}

/// A secondary index descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub name: String,
    pub kind: IndexKind,
    pub key_schema: KeySchema,
    pub projection: IndexProjection,
}

/// Table capacity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThroughputMode {
    Provisioned {
        read_capacity: u64,
        write_capacity: u64,
    },
    OnDemand,
}

/// Change-stream view type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

/// Change-stream settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_type: Option<StreamViewType>,
}

/// Server-side encryption settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSpec {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

/// Immutable description of a table as returned by `describe_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub key_schema: KeySchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<SecondaryIndex>,
    pub throughput: ThroughputMode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamSpec>,
    /// Service resource identifier (ARN), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

impl TableDescriptor {
    /// Minimal descriptor: key schema and on-demand capacity.
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
            indexes: Vec::new(),
            throughput: ThroughputMode::OnDemand,
            tags: BTreeMap::new(),
            encryption: None,
            stream: None,
            arn: None,
        }
    }

    /// Descriptor for creating a clone of this table under a new name.
    ///
    /// Carries over what every clone needs (key schema, indexes,
    /// throughput mode); tags, encryption, and stream settings are
    /// applied separately and only for a verbose copy.
    pub fn for_clone(&self, target_name: impl Into<String>) -> TableDescriptor {
        TableDescriptor {
            name: target_name.into(),
            key_schema: self.key_schema.clone(),
            indexes: self.indexes.clone(),
            throughput: self.throughput,
            tags: BTreeMap::new(),
            encryption: None,
            stream: None,
            arn: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(pk: &str, sort: Option<(&str, KeyType)>) -> KeySchema {
        KeySchema::new(
            KeyAttribute::new(pk, KeyType::String),
            sort.map(|(name, kt)| KeyAttribute::new(name, kt)),
        )
    }

    #[test]
    fn test_key_schema_compatibility() {
        let a = schema("id", Some(("ts", KeyType::Number)));
        let b = schema("id", Some(("ts", KeyType::Number)));
        assert!(a.is_compatible_with(&b));
    }

    #[test]
    fn test_key_schema_partition_name_mismatch() {
        let a = schema("id", None);
        let b = schema("pk", None);
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn test_key_schema_sort_key_mismatch() {
        let a = schema("id", Some(("ts", KeyType::Number)));
        let b = schema("id", None);
        assert!(!a.is_compatible_with(&b));
        let c = schema("id", Some(("ts", KeyType::String)));
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn test_for_clone_keeps_schema_drops_metadata() {
        let mut source = TableDescriptor::new("prod_table", schema("id", None));
        source.throughput = ThroughputMode::Provisioned {
            read_capacity: 100,
            write_capacity: 50,
        };
        source.tags.insert("team".into(), "storage".into());
        source.stream = Some(StreamSpec {
            enabled: true,
            view_type: Some(StreamViewType::NewAndOldImages),
        });
        source.arn = Some("arn:aws:dynamodb:us-east-1:123:table/prod_table".into());

        let clone = source.for_clone("prod_table_copy");
        assert_eq!(clone.name, "prod_table_copy");
        assert!(clone.key_schema.is_compatible_with(&source.key_schema));
        assert_eq!(clone.throughput, source.throughput);
        assert!(clone.tags.is_empty());
        assert!(clone.stream.is_none());
        assert!(clone.arn.is_none());
    }
}
