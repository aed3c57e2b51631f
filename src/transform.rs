//! JSON payload transforms applied before loading into BigQuery
//!
//! Renames keys to BigQuery-compliant field names and prunes empty values.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::sql::sanitize::to_bigquery_field_name;

/// Replace the top-level keys of an object with BigQuery-compliant names
///
/// Values are left untouched. When two keys map to the same name the later
/// one wins.
pub fn to_bigquery_keys(obj: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut renamed = Map::with_capacity(obj.len());
    for (key, value) in obj {
        let new_key = to_bigquery_field_name(&key)?;
        if renamed.contains_key(&new_key) {
            warn!(original = %key, field = %new_key, "field name collision, keeping later value");
        }
        renamed.insert(new_key, value);
    }
    Ok(renamed)
}

/// Apply `to_bigquery_keys` to every object at every depth
pub fn rename_keys_recursive(value: Value) -> Result<Value> {
    match value {
        Value::Object(obj) => {
            let mut renamed = Map::with_capacity(obj.len());
            for (key, child) in obj {
                renamed.insert(key, rename_keys_recursive(child)?);
            }
            Ok(Value::Object(to_bigquery_keys(renamed)?))
        }
        Value::Array(items) => items
            .into_iter()
            .map(rename_keys_recursive)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        scalar => Ok(scalar),
    }
}

/// Recursively drop `null`, `[]`, and `{}` from objects and arrays
///
/// Children are pruned first, so a container that only held empty values
/// is removed as well. Falsy scalars such as `0`, `false`, and `""` are kept.
pub fn drop_empty_iters(value: Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, drop_empty_iters(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(drop_empty_iters)
                .filter(|v| !is_empty(v))
                .collect(),
        ),
        scalar => scalar,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}
