//! Deep merge for YAML documents.
//!
//! Dependency and run-configuration documents can be split across several
//! files. They are folded together left to right with these rules:
//!
//! - Mappings are merged recursively
//! - Sequences are concatenated (base entries first)
//! - Any other overlay value replaces the base value
//! - A null or empty document contributes nothing

use serde_yaml::Value;

/// Deep merge two YAML values, with `overlay` winning on conflict.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                let merged = match base_map.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                result.insert(key.clone(), merged);
            }

            Value::Mapping(result)
        }

        (Value::Sequence(base_seq), Value::Sequence(overlay_seq)) => {
            let mut result = base_seq.clone();
            result.extend(overlay_seq.iter().cloned());
            Value::Sequence(result)
        }

        (_, overlay) => overlay.clone(),
    }
}

/// Merge several documents in order (later overrides earlier).
///
/// Null documents, which is what an empty YAML file parses to, are skipped.
pub fn merge_documents(documents: &[Value]) -> Value {
    documents
        .iter()
        .filter(|doc| !doc.is_null())
        .fold(Value::Mapping(Default::default()), |acc, doc| {
            deep_merge(&acc, doc)
        })
}
