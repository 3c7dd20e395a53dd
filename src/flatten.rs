//! Collapses nested records into dot-qualified leaf keys.
//!
//! `{"address": {"city": "Accra"}}` becomes `{"address.city": "Accra"}`.
//! Arrays are leaves and are never expanded, so flattening an already-flat
//! record returns it unchanged.

use serde_json::{Map, Value};

pub type FlatRecord = Map<String, Value>;

/// Flattens one record. Non-object input yields an empty record.
pub fn flatten(record: &Value) -> FlatRecord {
    let mut result = FlatRecord::new();
    flatten_into(record, "", &mut result);
    result
}

/// Flattens `record` into `acc`, prefixing every key with `prefix.`.
pub fn flatten_into(record: &Value, prefix: &str, acc: &mut FlatRecord) {
    let Value::Object(obj) = record else {
        return;
    };
    for (key, value) in obj {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(_) => flatten_into(value, &full_key, acc),
            leaf => {
                acc.insert(full_key, leaf.clone());
            }
        }
    }
}
