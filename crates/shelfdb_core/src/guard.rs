//! Primary-key protection for partial updates.

use serde_json::{Map, Value};
use shelfdb_engine::{lookup_path, remove_path, set_path, KeyPath};

/// Merges `partial` over `existing` without letting it touch the key.
///
/// Every key path is removed from a copy of `partial` before a shallow
/// merge. The existing key values are then written back, so a partial
/// that replaces a parent object (`{"meta": {...}}` over key path
/// `meta.id`) still keeps the key.
///
/// Without a key path this is a plain shallow merge.
#[must_use]
pub fn protect(
    existing: &Map<String, Value>,
    partial: &Map<String, Value>,
    key_path: Option<&KeyPath>,
) -> Map<String, Value> {
    let mut merged = existing.clone();

    let Some(key_path) = key_path else {
        merged.extend(partial.iter().map(|(k, v)| (k.clone(), v.clone())));
        return merged;
    };

    let mut patch = partial.clone();
    for path in key_path.paths() {
        remove_path(&mut patch, path);
    }
    merged.extend(patch);

    for path in key_path.paths() {
        if let Some(value) = lookup_path(existing, path) {
            set_path(&mut merged, path, value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn key_field_is_kept() {
        let existing = object(json!({"id": "a1", "value": 100}));
        let partial = object(json!({"id": "zzz", "value": 200}));
        let merged = protect(&existing, &partial, Some(&KeyPath::from("id")));
        assert_eq!(Value::Object(merged), json!({"id": "a1", "value": 200}));
    }

    #[test]
    fn no_key_path_is_plain_merge() {
        let existing = object(json!({"a": 1, "b": 2}));
        let partial = object(json!({"b": 3, "c": 4}));
        assert_eq!(
            Value::Object(protect(&existing, &partial, None)),
            json!({"a": 1, "b": 3, "c": 4})
        );
    }

    #[test]
    fn nested_key_survives_parent_replacement() {
        let existing = object(json!({"meta": {"id": 7, "tag": "x"}, "v": 1}));
        let partial = object(json!({"meta": {"id": 8, "tag": "y"}}));
        let merged = protect(&existing, &partial, Some(&KeyPath::from("meta.id")));
        assert_eq!(
            Value::Object(merged),
            json!({"meta": {"id": 7, "tag": "y"}, "v": 1})
        );

        let partial = object(json!({"meta": "flattened"}));
        let merged = protect(&existing, &partial, Some(&KeyPath::from("meta.id")));
        assert_eq!(merged["meta"]["id"], json!(7));
    }

    #[test]
    fn every_path_of_a_composite_key_is_protected() {
        let existing = object(json!({"a": 1, "b": 2, "c": 3}));
        let partial = object(json!({"a": 9, "b": 9, "c": 9}));
        let merged = protect(&existing, &partial, Some(&KeyPath::from(["a", "b"])));
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2, "c": 9}));
    }

    proptest! {
        #[test]
        fn key_never_changes(
            key in "[a-z0-9]{1,8}",
            attempted in "[a-z0-9]{1,8}",
            value in any::<i64>(),
        ) {
            let existing = object(json!({"id": key.clone(), "value": 0}));
            let partial = object(json!({"id": attempted, "value": value}));
            let merged = protect(&existing, &partial, Some(&KeyPath::from("id")));
            prop_assert_eq!(&merged["id"], &json!(key));
            prop_assert_eq!(&merged["value"], &json!(value));
        }
    }
}
