//! Empty-collection normalization of parsed bodies

use serde_json::{Map, Value};

/// Replace every empty-array field with `null`.
///
/// Applies to the fields of a top-level object, or to the fields of each
/// object element of a top-level array. Deeper levels and non-empty arrays
/// are left alone, so an empty collection and a missing field look the same
/// to decoders using `Option<Vec<_>>`.
pub(crate) fn normalize_empty_arrays(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_object(map)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(normalize_object(map)),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn normalize_object(mut map: Map<String, Value>) -> Map<String, Value> {
    for value in map.values_mut() {
        if matches!(value, Value::Array(items) if items.is_empty()) {
            *value = Value::Null;
        }
    }
    map
}
