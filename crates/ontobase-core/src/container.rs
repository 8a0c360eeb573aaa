//! # Property Container
//!
//! An insertion-ordered mapping from string offsets to JSON values with
//! delete-on-null semantics: no key ever maps to `Value::Null`.
//!
//! Every operation is total. Reading a missing offset yields `None` (or
//! `Value::Null` through [`PropertyContainer::value`]); assigning null removes
//! the offset.

use crate::{Record, Value};
use serde::{Serialize, Serializer};

/// Ordered property mapping where null means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyContainer {
    properties: Record,
}

impl PropertyContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from a native record, dropping null entries.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        record.into_iter().collect()
    }

    /// Get the value stored at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Get the value stored at `key`, or `Value::Null` when absent.
    #[must_use]
    pub fn value(&self, key: &str) -> Value {
        self.properties.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Get a string value stored at `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Assign `value` to `key`, returning the previous value.
    ///
    /// Assigning `Value::Null` is the same as [`PropertyContainer::delete`].
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        match value.into() {
            Value::Null => self.delete(&key),
            value => self.properties.insert(key, value),
        }
    }

    /// Remove `key`, returning its value. No-op when absent.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.properties.shift_remove(key)
    }

    /// Check whether `key` holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Number of offsets holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the container holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate over offsets in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }

    /// Iterate over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.properties.values()
    }

    /// Iterate over `(offset, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    /// Apply every entry of `changes`; null entries delete.
    pub fn merge(&mut self, changes: Record) {
        for (key, value) in changes {
            self.set(key, value);
        }
    }

    /// Remove every offset.
    pub fn clear(&mut self) {
        self.properties.clear();
    }

    /// Borrow the underlying record.
    #[must_use]
    pub fn as_record(&self) -> &Record {
        &self.properties
    }

    /// Consume the container into its record.
    #[must_use]
    pub fn into_record(self) -> Record {
        self.properties
    }

    /// Recursively flatten into a plain nested mapping.
    ///
    /// Nested objects are flattened too, dropping their null entries; arrays
    /// keep their positions.
    #[must_use]
    pub fn flatten(&self) -> Record {
        flatten_record(&self.properties)
    }
}

fn flatten_record(record: &Record) -> Record {
    record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), flatten_value(value)))
        .collect()
}

fn flatten_value(value: &Value) -> Value {
    match value {
        Value::Object(record) => Value::Object(flatten_record(record)),
        Value::Array(items) => Value::Array(items.iter().map(flatten_value).collect()),
        other => other.clone(),
    }
}

impl FromIterator<(String, Value)> for PropertyContainer {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut container = Self::new();
        for (key, value) in iter {
            container.set(key, value);
        }
        container
    }
}

impl From<PropertyContainer> for Value {
    fn from(container: PropertyContainer) -> Self {
        Value::Object(container.flatten())
    }
}

impl From<PropertyContainer> for Record {
    fn from(container: PropertyContainer) -> Self {
        container.properties
    }
}

impl Serialize for PropertyContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.flatten().serialize(serializer)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_null_deletes() {
        let mut container = PropertyContainer::new();
        container.set("a", 1);
        container.set("a", Value::Null);

        assert!(container.get("a").is_none());
        assert_eq!(container.value("a"), Value::Null);
        assert_eq!(container.keys().count(), 0);
    }

    #[test]
    fn missing_key_reads_null() {
        let container = PropertyContainer::new();
        assert_eq!(container.value("nope"), Value::Null);
        assert!(!container.contains("nope"));
    }

    #[test]
    fn delete_absent_is_noop() {
        let mut container = PropertyContainer::new();
        container.set("a", "x");
        assert!(container.delete("b").is_none());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn delete_preserves_order_of_remaining_keys() {
        let mut container = PropertyContainer::new();
        container.set("a", 1);
        container.set("b", 2);
        container.set("c", 3);
        container.delete("a");

        let keys: Vec<_> = container.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn from_record_drops_nulls() {
        let record = json!({"a": 1, "b": null})
            .as_object()
            .cloned()
            .expect("object");
        let container = PropertyContainer::from_record(record);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn flatten_recurses_into_nested_objects() {
        let mut container = PropertyContainer::new();
        container.set("name", json!({"en": "Name", "it": null}));
        container.set("list", json!([{"x": null, "y": 1}, null]));

        let flat = container.flatten();
        assert_eq!(flat["name"], json!({"en": "Name"}));
        assert_eq!(flat["list"], json!([{"y": 1}, null]));
    }

    #[test]
    fn merge_applies_delete_on_null() {
        let mut container = PropertyContainer::new();
        container.set("a", 1);
        container.set("b", 2);
        container.merge(
            json!({"a": null, "c": 3})
                .as_object()
                .cloned()
                .expect("object"),
        );

        assert!(!container.contains("a"));
        assert_eq!(container.value("b"), json!(2));
        assert_eq!(container.value("c"), json!(3));
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut container = PropertyContainer::new();
        container.set("k", "v");
        let text = serde_json::to_string(&container).expect("serialize");
        assert_eq!(text, r#"{"k":"v"}"#);
    }
}
