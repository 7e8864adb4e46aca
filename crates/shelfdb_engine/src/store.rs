//! In-memory state of one store and its indexes.

use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use crate::keypath::{lookup_path, set_path, KeyPath};
use crate::schema::{IndexParams, StoreParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One staged write, as recorded in a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Mutation {
    Put { key: Key, value: Value },
    Delete { key: Key },
}

#[derive(Debug, Clone)]
pub(crate) struct IndexState {
    pub(crate) params: IndexParams,
    /// Index key to the primary keys holding it.
    pub(crate) entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl IndexState {
    fn new(params: IndexParams) -> Self {
        Self {
            params,
            entries: BTreeMap::new(),
        }
    }

    /// Index keys a record contributes. Empty when the path is missing or
    /// holds something that is not a key.
    fn keys_for(&self, record: &Value) -> Vec<Key> {
        if self.params.multi_entry {
            if let KeyPath::Single(path) = &self.params.key_path {
                let value = record.as_object().and_then(|object| lookup_path(object, path));
                if let Some(Value::Array(items)) = value {
                    let unique: BTreeSet<Key> = items.iter().filter_map(Key::from_value).collect();
                    return unique.into_iter().collect();
                }
            }
        }
        self.params.key_path.extract(record).into_iter().collect()
    }

    fn conflict(&self, keys: &[Key], primary: &Key) -> Option<Key> {
        if !self.params.unique {
            return None;
        }
        keys.iter()
            .find(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|owners| owners.iter().any(|owner| owner != primary))
            })
            .cloned()
    }

    fn link(&mut self, keys: Vec<Key>, primary: &Key) {
        for key in keys {
            self.entries.entry(key).or_default().insert(primary.clone());
        }
    }

    fn unlink(&mut self, keys: &[Key], primary: &Key) {
        for key in keys {
            if let Some(owners) = self.entries.get_mut(key) {
                owners.remove(primary);
                if owners.is_empty() {
                    self.entries.remove(key);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoreState {
    pub(crate) params: StoreParams,
    pub(crate) records: BTreeMap<Key, Value>,
    pub(crate) indexes: BTreeMap<String, IndexState>,
    /// Next generated key. Starts at 1.
    pub(crate) next_key: u64,
}

impl StoreState {
    pub(crate) fn new(params: StoreParams) -> Self {
        Self {
            params,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
            next_key: 1,
        }
    }

    /// Works out the primary key of a record about to be written.
    ///
    /// For in-line stores with a generator, a missing key is generated and
    /// written into the record.
    pub(crate) fn resolve_key(
        &mut self,
        value: &mut Value,
        explicit: Option<Key>,
    ) -> EngineResult<Key> {
        let key_path = self.params.key_path.clone();
        let key = match (key_path.as_ref(), explicit) {
            (Some(_), Some(_)) => {
                return Err(EngineError::data(
                    "store uses in-line keys; an explicit key is not allowed",
                ));
            }
            (Some(path), None) => {
                let KeyPath::Single(path) = path else {
                    return Err(EngineError::data("composite primary keys not supported"));
                };
                let object = value
                    .as_object_mut()
                    .ok_or_else(|| EngineError::data("record must be a JSON object"))?;
                match lookup_path(object, path) {
                    Some(found) => Key::from_value(found)
                        .filter(|key| !key.is_array())
                        .ok_or_else(|| {
                            EngineError::data(format!("value at {path:?} is not a valid key"))
                        })?,
                    None if self.params.auto_increment => {
                        let key = self.generate()?;
                        set_path(object, path, key.to_value());
                        return Ok(key);
                    }
                    None => {
                        return Err(EngineError::data(format!("record has no key at {path:?}")));
                    }
                }
            }
            (None, Some(key)) => {
                if key.is_array() {
                    return Err(EngineError::data("composite primary keys not supported"));
                }
                key
            }
            (None, None) if self.params.auto_increment => return self.generate(),
            (None, None) => {
                return Err(EngineError::data(
                    "store has no key path and no key generator; a key is required",
                ));
            }
        };

        if self.params.auto_increment {
            self.observe(&key);
        }
        Ok(key)
    }

    fn generate(&mut self) -> EngineResult<Key> {
        // Keys above 2^53 lose precision as f64.
        if self.next_key > 9_007_199_254_740_992 {
            return Err(EngineError::constraint("key generator exhausted"));
        }
        let key = Key::from(self.next_key);
        self.next_key += 1;
        Ok(key)
    }

    /// Moves the generator past an explicitly supplied numeric key.
    fn observe(&mut self, key: &Key) {
        if let Some(n) = key.as_f64() {
            if n >= self.next_key as f64 {
                self.next_key = (n.floor() as u64).saturating_add(1);
            }
        }
    }

    /// Writes a record and its index entries.
    ///
    /// With `no_overwrite`, an existing key is a constraint error.
    pub(crate) fn insert(&mut self, key: Key, value: Value, no_overwrite: bool) -> EngineResult<()> {
        if no_overwrite && self.records.contains_key(&key) {
            return Err(EngineError::constraint(format!("key {key} already exists")));
        }

        let mut staged = Vec::with_capacity(self.indexes.len());
        for (name, index) in &self.indexes {
            let keys = index.keys_for(&value);
            if let Some(taken) = index.conflict(&keys, &key) {
                return Err(EngineError::constraint(format!(
                    "unique index {name} already holds {taken}"
                )));
            }
            staged.push(keys);
        }

        if let Some(old) = self.records.get(&key) {
            let old_keys: Vec<Vec<Key>> =
                self.indexes.values().map(|index| index.keys_for(old)).collect();
            for (index, keys) in self.indexes.values_mut().zip(old_keys) {
                index.unlink(&keys, &key);
            }
        }
        for (index, keys) in self.indexes.values_mut().zip(staged) {
            index.link(keys, &key);
        }
        self.records.insert(key, value);
        Ok(())
    }

    /// Removes a record and its index entries.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Value> {
        let old = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            let keys = index.keys_for(&old);
            index.unlink(&keys, key);
        }
        Some(old)
    }

    /// Adds an index and fills it from the existing records.
    pub(crate) fn create_index(
        &mut self,
        store: &str,
        name: &str,
        params: IndexParams,
    ) -> EngineResult<()> {
        if self.indexes.contains_key(name) {
            return Err(EngineError::IndexExists {
                store: store.to_string(),
                index: name.to_string(),
            });
        }
        params.validate()?;

        let mut index = IndexState::new(params);
        for (primary, record) in &self.records {
            let keys = index.keys_for(record);
            if let Some(taken) = index.conflict(&keys, primary) {
                return Err(EngineError::constraint(format!(
                    "cannot build unique index {name}: {taken} appears more than once"
                )));
            }
            index.link(keys, primary);
        }
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    pub(crate) fn apply(&mut self, mutation: Mutation) -> EngineResult<()> {
        match mutation {
            Mutation::Put { key, value } => self.insert(key, value, false),
            Mutation::Delete { key } => {
                self.remove(&key);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inline_store() -> StoreState {
        StoreState::new(StoreParams::new().key_path("id"))
    }

    #[test]
    fn inline_key_is_read_from_record() {
        let mut store = inline_store();
        let mut record = json!({"id": "a1", "value": 100});
        let key = store.resolve_key(&mut record, None).unwrap();
        assert_eq!(key, Key::from("a1"));
    }

    #[test]
    fn inline_store_rejects_explicit_key_and_missing_key() {
        let mut store = inline_store();
        assert!(store
            .resolve_key(&mut json!({"id": 1}), Some(Key::from(1)))
            .is_err());
        assert!(store.resolve_key(&mut json!({"value": 1}), None).is_err());
        assert!(store.resolve_key(&mut json!({"id": [1, 2]}), None).is_err());
    }

    #[test]
    fn generator_injects_key_into_record() {
        let mut store = StoreState::new(StoreParams::new().key_path("id").auto_increment(true));
        let mut record = json!({"value": 1});
        let key = store.resolve_key(&mut record, None).unwrap();
        assert_eq!(key, Key::from(1));
        assert_eq!(record, json!({"value": 1, "id": 1}));
        assert_eq!(store.next_key, 2);
    }

    #[test]
    fn explicit_numeric_key_bumps_generator() {
        let mut store = StoreState::new(StoreParams::new().auto_increment(true));
        let mut record = json!({});
        store.resolve_key(&mut record, Some(Key::number(7.5).unwrap())).unwrap();
        assert_eq!(store.next_key, 8);
        store.resolve_key(&mut record, Some(Key::from(3))).unwrap();
        assert_eq!(store.next_key, 8);
        assert_eq!(store.resolve_key(&mut record, None).unwrap(), Key::from(8));
    }

    #[test]
    fn out_of_line_store_without_generator_needs_a_key() {
        let mut store = StoreState::new(StoreParams::new());
        assert!(store.resolve_key(&mut json!({}), None).is_err());
        assert_eq!(
            store.resolve_key(&mut json!({}), Some(Key::from("k"))).unwrap(),
            Key::from("k")
        );
    }

    #[test]
    fn no_overwrite_rejects_existing_key() {
        let mut store = inline_store();
        store.insert(Key::from(1), json!({"id": 1}), true).unwrap();
        assert!(matches!(
            store.insert(Key::from(1), json!({"id": 1}), true),
            Err(EngineError::Constraint { .. })
        ));
        store.insert(Key::from(1), json!({"id": 1, "v": 2}), false).unwrap();
        assert_eq!(store.records[&Key::from(1)], json!({"id": 1, "v": 2}));
    }

    #[test]
    fn index_tracks_updates_and_deletes() {
        let mut store = inline_store();
        store.create_index("time", "by_value", IndexParams::new("value")).unwrap();
        store.insert(Key::from(1), json!({"id": 1, "value": 10}), false).unwrap();
        store.insert(Key::from(1), json!({"id": 1, "value": 20}), false).unwrap();

        let entries = &store.indexes["by_value"].entries;
        assert!(!entries.contains_key(&Key::from(10)));
        assert!(entries[&Key::from(20)].contains(&Key::from(1)));

        store.remove(&Key::from(1));
        assert!(store.indexes["by_value"].entries.is_empty());
    }

    #[test]
    fn unique_index_rejects_second_owner() {
        let mut store = inline_store();
        store
            .create_index("users", "by_email", IndexParams::new("email").unique(true))
            .unwrap();
        store.insert(Key::from(1), json!({"id": 1, "email": "a@x"}), false).unwrap();
        assert!(store
            .insert(Key::from(2), json!({"id": 2, "email": "a@x"}), false)
            .is_err());
        // Rewriting the owner keeps its own entry.
        store.insert(Key::from(1), json!({"id": 1, "email": "a@x"}), false).unwrap();
        assert_eq!(store.records.len(), 1);
    }

    #[test]
    fn multi_entry_index_splits_arrays() {
        let mut store = inline_store();
        store
            .create_index("posts", "by_tag", IndexParams::new("tags").multi_entry(true))
            .unwrap();
        store
            .insert(Key::from(1), json!({"id": 1, "tags": ["a", "b", "a"]}), false)
            .unwrap();
        let entries = &store.indexes["by_tag"].entries;
        assert_eq!(entries.len(), 2);
        assert!(entries[&Key::from("a")].contains(&Key::from(1)));
    }

    #[test]
    fn create_index_builds_from_existing_records() {
        let mut store = inline_store();
        store.insert(Key::from(1), json!({"id": 1, "day": 2}), false).unwrap();
        store.insert(Key::from(2), json!({"id": 2, "day": 2}), false).unwrap();
        store.insert(Key::from(3), json!({"id": 3}), false).unwrap();

        store.create_index("events", "by_day", IndexParams::new("day")).unwrap();
        assert_eq!(store.indexes["by_day"].entries[&Key::from(2)].len(), 2);

        assert!(store
            .create_index("events", "day_unique", IndexParams::new("day").unique(true))
            .is_err());
        assert!(matches!(
            store.create_index("events", "by_day", IndexParams::new("day")),
            Err(EngineError::IndexExists { .. })
        ));
    }
}
