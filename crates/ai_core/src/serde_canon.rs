//! Canonical JSON and blake3 fingerprints for model artifacts
//!
//! Two model files that differ only in key order or whitespace get the same
//! fingerprint, so the value reported by `/health` identifies the trees and
//! not the file layout.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(json_value);
    Ok(serde_json::to_string(&canonical)?)
}

/// Rebuild objects with sorted keys, recursively
fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize_value(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}

/// Blake3 hash of the canonical JSON representation
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<[u8; 32], CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(*blake3::hash(json.as_bytes()).as_bytes())
}

/// Blake3 hash as a lowercase hex string
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    Ok(hex::encode(hash_canonical(value)?))
}
