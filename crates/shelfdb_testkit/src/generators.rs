//! Property-based test generators using proptest.
//!
//! Provides strategies for keys and records that keep the invariants the
//! store expects: keys are numbers or strings, records are non-empty
//! objects.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use shelfdb_engine::Key;

/// Strategy for primary keys: integers or short strings.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        any::<i32>().prop_map(Key::from),
        prop::string::string_regex("[a-z0-9]{1,12}")
            .expect("Invalid regex")
            .prop_map(Key::from),
    ]
}

/// Strategy for valid collection or index names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for scalar field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        prop::string::string_regex("[ -~]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Strategy for a record keyed by `id`, with one to four extra fields.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    (
        prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex"),
        prop::collection::btree_map(
            prop::string::string_regex("f_[a-z]{1,6}").expect("Invalid regex"),
            field_value_strategy(),
            1..4,
        ),
    )
        .prop_map(|(id, fields)| {
            let mut record: Map<String, Value> = fields.into_iter().collect();
            record.insert("id".to_string(), json!(id));
            Value::Object(record)
        })
}

/// Strategy for `count`-bounded batches of records with distinct ids.
pub fn distinct_records_strategy(
    count: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex"),
        any::<i64>(),
        count,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, value)| json!({"id": id, "value": value}))
            .collect()
    })
}

/// Strategy for partial updates that may try to overwrite `id`.
pub fn partial_strategy() -> impl Strategy<Value = Value> {
    (
        prop::option::of(prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex")),
        any::<i64>(),
    )
        .prop_map(|(id, value)| match id {
            Some(id) => json!({"id": id, "value": value}),
            None => json!({"value": value}),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn records_are_non_empty_objects_with_ids(record in record_strategy()) {
            let object = record.as_object().unwrap();
            prop_assert!(object.len() >= 2);
            prop_assert!(object["id"].is_string());
        }

        #[test]
        fn distinct_records_have_distinct_ids(records in distinct_records_strategy(1..20)) {
            let ids: std::collections::BTreeSet<_> =
                records.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect();
            prop_assert_eq!(ids.len(), records.len());
        }

        #[test]
        fn keys_are_never_arrays(key in key_strategy()) {
            prop_assert!(!key.is_array());
        }
    }
}
