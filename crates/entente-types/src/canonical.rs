//! Canonical serialisation for signed structures.
//!
//! The canonical form of a structure is its JSON encoding with every object's
//! keys sorted (recursively) and the signature field(s) removed from the top
//! level. Signing and verification both run over these bytes, so two parties
//! that agree on the field values always agree on the signed message, no
//! matter how either side orders its maps.

use serde::Serialize;
use serde_json::Value;

use crate::error::TypesError;

/// A structure that is signed over its canonical form.
pub trait Canonical: Serialize {
    /// Top-level fields excluded from the canonical form.
    const SIGNATURE_FIELDS: &'static [&'static str];

    /// Returns the canonical bytes of this structure.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Serialization`] if the structure cannot be
    /// encoded as JSON.
    fn canonical_bytes(&self) -> Result<Vec<u8>, TypesError> {
        canonical_bytes(self, Self::SIGNATURE_FIELDS)
    }
}

/// Serialises `value` with sorted keys, omitting the `excluded` top-level
/// fields.
///
/// # Errors
///
/// Returns [`TypesError::Serialization`] if `value` cannot be encoded as JSON.
pub fn canonical_bytes<T: Serialize + ?Sized>(
    value: &T,
    excluded: &[&str],
) -> Result<Vec<u8>, TypesError> {
    let mut json = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut json {
        for field in excluded {
            map.remove(*field);
        }
    }
    Ok(serde_json::to_vec(&sort_keys(json))?)
}

// Rebuilds every object in key order so the output does not depend on whether
// serde_json was compiled with `preserve_order`.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_canonical_bytes() {
        let a = json!({"b": 1, "a": {"y": true, "x": [ {"d": 1, "c": 2} ]}});
        let b = json!({"a": {"x": [ {"c": 2, "d": 1} ], "y": true}, "b": 1});

        assert_eq!(canonical_bytes(&a, &[]).unwrap(), canonical_bytes(&b, &[]).unwrap());
    }

    #[test]
    fn excluded_fields_are_dropped() {
        let signed = json!({"name": "p", "signature": "abcd"});
        let unsigned = json!({"name": "p"});

        assert_eq!(
            canonical_bytes(&signed, &["signature"]).unwrap(),
            canonical_bytes(&unsigned, &[]).unwrap()
        );
        assert_eq!(canonical_bytes(&unsigned, &[]).unwrap(), br#"{"name":"p"}"#.to_vec());
    }

    #[test]
    fn only_top_level_fields_are_excluded() {
        let nested = json!({"payload": {"signature": "kept"}, "signature": "dropped"});
        let bytes = canonical_bytes(&nested, &["signature"]).unwrap();
        assert_eq!(bytes, br#"{"payload":{"signature":"kept"}}"#.to_vec());
    }
}
