//! Canonical JSON serialization for artifact hashing
//!
//! Artifacts are written with recursively sorted object keys and a fixed
//! two-space indent so that the same fitted object always produces the same
//! bytes, and therefore the same Blake3 hash.

use serde::Serialize;
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};

use crate::errors::Result;

/// Recursively sort JSON object keys to obtain a canonical representation.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }

            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value to canonical JSON (sorted keys, two-space indent)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(value)?);

    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    canonical.serialize(&mut serializer)?;

    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Blake3 hash of raw bytes as lowercase hex
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Compute Blake3 hash of the canonical JSON representation as hex
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String> {
    let json = to_canonical_json(value)?;
    Ok(hash_bytes_hex(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        b_field: i64,
        a_field: i64,
        z_field: String,
    }

    #[derive(Serialize)]
    struct Reordered {
        z_field: String,
        a_field: i64,
        b_field: i64,
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = to_canonical_json(&Sample {
            b_field: 2,
            a_field: 1,
            z_field: "x".to_string(),
        })
        .unwrap();

        let a_pos = json.find("a_field").unwrap();
        let b_pos = json.find("b_field").unwrap();
        let z_pos = json.find("z_field").unwrap();
        assert!(a_pos < b_pos);
        assert!(b_pos < z_pos);
    }

    #[test]
    fn test_hash_ignores_declaration_order() {
        let h1 = hash_canonical_hex(&Sample {
            b_field: 2,
            a_field: 1,
            z_field: "x".to_string(),
        })
        .unwrap();
        let h2 = hash_canonical_hex(&Reordered {
            z_field: "x".to_string(),
            a_field: 1,
            b_field: 2,
        })
        .unwrap();

        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_hash_changes_with_data() {
        let h1 = hash_canonical_hex(&Sample {
            b_field: 2,
            a_field: 1,
            z_field: "x".to_string(),
        })
        .unwrap();
        let h2 = hash_canonical_hex(&Sample {
            b_field: 3,
            a_field: 1,
            z_field: "x".to_string(),
        })
        .unwrap();

        assert_ne!(h1, h2);
    }
}
