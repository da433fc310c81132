//! Helpers for the free-form `mapping string -> JSON value` columns
//! used throughout the schema (stack task results/outputs/configuration/
//! metadata, resource properties/metadata, execution outputs, drift
//! expected/actual state).
//!
//! The four stack mappings and their resource/drift counterparts are
//! deliberately left untyped at the API surface (a tagged JSON-value
//! sum type, i.e. `serde_json::Value`) — their schemalessness is a
//! forward-compatibility feature, not an oversight.

use serde_json::{Map, Value};

pub type JsonMap = Map<String, Value>;

/// Serializes a map to a JSON text column.
pub fn to_column(map: &JsonMap) -> String {
    Value::Object(map.clone()).to_string()
}

/// Deserializes a JSON text column back into a map.
///
/// Malformed JSON is repaired silently by substituting an empty
/// mapping — the documented forward-compatibility guard for columns
/// written by a newer or older schema version.
pub fn from_column(text: &str) -> JsonMap {
    if text.is_empty() {
        return JsonMap::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}
