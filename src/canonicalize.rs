//! Canonical to-be-signed encoding.
//!
//! Certificates, OCSP responses, CRLs and timestamp tokens are signed over
//! the canonical JSON of every field except `signature`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Error;

const SIGNATURE_FIELD: &str = "signature";

/// Recursively sort JSON object keys and produce a canonical string.
///
/// Arrays keep their order and insignificant whitespace is removed.
pub fn canonicalize(value: &Value) -> String {
    let sorted = sort_keys_recursive(value);
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Canonical bytes of `item` with its top-level `signature` field removed.
///
/// # Errors
///
/// Returns an error if `item` cannot be represented as JSON.
pub fn to_be_signed<T: Serialize>(item: &T) -> Result<Vec<u8>, Error> {
    let mut value = serde_json::to_value(item)?;
    if let Value::Object(map) = &mut value {
        map.remove(SIGNATURE_FIELD);
    }
    Ok(canonicalize(&value).into_bytes())
}

fn sort_keys_recursive(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys_recursive(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys_recursive).collect()),
        other => other.clone(),
    }
}
