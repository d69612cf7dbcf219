//! Dynamic item payloads.
//!
//! Items are opaque attribute maps copied verbatim; the only
//! introspection the engine performs is primary-key extraction, used
//! to deduplicate keys within a single write batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::KeySchema;

/// A dynamically-typed attribute value, mirroring the wire format's
/// tagged union so serialization to the target service is total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, transported as its decimal string form.
    N(String),
    /// Binary.
    B(Vec<u8>),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null marker.
    #[serde(rename = "NULL")]
    Null(bool),
    /// List.
    L(Vec<AttributeValue>),
    /// Map.
    M(HashMap<String, AttributeValue>),
    /// String set.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Number set.
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Binary set.
    #[serde(rename = "BS")]
    Bs(Vec<Vec<u8>>),
}

/// An item: an attribute name to value map.
pub type Item = HashMap<String, AttributeValue>;

fn scalar_repr(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::S(s) => Some(format!("s:{s}")),
        AttributeValue::N(n) => Some(format!("n:{n}")),
        AttributeValue::B(b) => Some(format!(
            "b:{}",
            b.iter().map(|byte| format!("{byte:02x}")).collect::<String>()
        )),
        _ => None,
    }
}

/// Canonical string form of an item's primary key under `schema`.
///
/// Returns `None` when the item is missing a key attribute or holds a
/// non-scalar value in a key position.
pub fn key_string(item: &Item, schema: &KeySchema) -> Option<String> {
    let mut key = scalar_repr(item.get(&schema.partition.name)?)?;
    if let Some(sort) = &schema.sort {
        key.push('|');
        key.push_str(&scalar_repr(item.get(&sort.name)?)?);
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{KeyAttribute, KeyType};

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_wire_tag_names() {
        let json = serde_json::to_string(&AttributeValue::S("x".into())).unwrap();
        assert_eq!(json, r#"{"S":"x"}"#);
        let json = serde_json::to_string(&AttributeValue::Bool(true)).unwrap();
        assert_eq!(json, r#"{"BOOL":true}"#);
        let json = serde_json::to_string(&AttributeValue::Null(true)).unwrap();
        assert_eq!(json, r#"{"NULL":true}"#);
        let json = serde_json::to_string(&AttributeValue::Ns(vec!["1".into()])).unwrap();
        assert_eq!(json, r#"{"NS":["1"]}"#);
    }

    #[test]
    fn test_nested_value_round_trip() {
        let value = AttributeValue::M(
            [
                ("a".to_string(), AttributeValue::N("42".into())),
                (
                    "b".to_string(),
                    AttributeValue::L(vec![AttributeValue::S("x".into())]),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let json = serde_json::to_string(&value).unwrap();
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_key_string_partition_only() {
        let schema = KeySchema::new(KeyAttribute::new("id", KeyType::String), None);
        let it = item(&[
            ("id", AttributeValue::S("user-1".into())),
            ("payload", AttributeValue::N("7".into())),
        ]);
        assert_eq!(key_string(&it, &schema), Some("s:user-1".to_string()));
    }

    #[test]
    fn test_key_string_composite() {
        let schema = KeySchema::new(
            KeyAttribute::new("id", KeyType::String),
            Some(KeyAttribute::new("ts", KeyType::Number)),
        );
        let it = item(&[
            ("id", AttributeValue::S("user-1".into())),
            ("ts", AttributeValue::N("1700000000".into())),
        ]);
        assert_eq!(
            key_string(&it, &schema),
            Some("s:user-1|n:1700000000".to_string())
        );
    }

    #[test]
    fn test_key_string_missing_attribute() {
        let schema = KeySchema::new(
            KeyAttribute::new("id", KeyType::String),
            Some(KeyAttribute::new("ts", KeyType::Number)),
        );
        let it = item(&[("id", AttributeValue::S("user-1".into()))]);
        assert_eq!(key_string(&it, &schema), None);
    }

    #[test]
    fn test_key_string_rejects_non_scalar_key() {
        let schema = KeySchema::new(KeyAttribute::new("id", KeyType::String), None);
        let it = item(&[("id", AttributeValue::Bool(true))]);
        assert_eq!(key_string(&it, &schema), None);
    }
}
