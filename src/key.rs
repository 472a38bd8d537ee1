//! Composite entity key construction.
//!
//! Keys are built from join-key names sorted lexicographically, so two rows
//! carrying the same join-key values map to the same key regardless of
//! column order.

use crate::error::{FeatureStoreError, Result};
use std::collections::HashMap;

pub const KEY_SEPARATOR: &str = "|";

/// Build the composite key for one entity row.
pub fn entity_key(
    row: &HashMap<String, serde_json::Value>,
    join_keys: &[String],
) -> Result<String> {
    let mut sorted_keys: Vec<&String> = join_keys.iter().collect();
    sorted_keys.sort();

    let mut segments = Vec::with_capacity(sorted_keys.len());
    for key in sorted_keys {
        let value = row.get(key).ok_or_else(|| {
            FeatureStoreError::Validation(format!("Entity row missing join key '{}'", key))
        })?;
        segments.push(format!("{}={}", key, key_segment(value)));
    }

    Ok(segments.join(KEY_SEPARATOR))
}

fn key_segment(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
