//! Inputs accepted by key-addressed operations.

use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use shelfdb_engine::Key;

/// A record: a JSON object.
pub type Record = Map<String, Value>;

/// One key or several.
///
/// ```rust
/// use shelfdb_core::KeyList;
///
/// assert_eq!(KeyList::from("a1").len(), 1);
/// assert_eq!(KeyList::from(["a1", "missing"]).len(), 2);
/// assert_eq!(KeyList::from(vec![1, 2, 3]).len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyList(Vec<Key>);

impl KeyList {
    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the keys.
    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.0.iter()
    }

    /// Returns the keys.
    #[must_use]
    pub fn into_vec(self) -> Vec<Key> {
        self.0
    }
}

impl From<Key> for KeyList {
    fn from(key: Key) -> Self {
        Self(vec![key])
    }
}

impl From<&str> for KeyList {
    fn from(key: &str) -> Self {
        Self(vec![Key::from(key)])
    }
}

impl From<String> for KeyList {
    fn from(key: String) -> Self {
        Self(vec![Key::from(key)])
    }
}

impl From<i64> for KeyList {
    fn from(key: i64) -> Self {
        Self(vec![Key::from(key)])
    }
}

impl From<i32> for KeyList {
    fn from(key: i32) -> Self {
        Self(vec![Key::from(key)])
    }
}

impl From<u32> for KeyList {
    fn from(key: u32) -> Self {
        Self(vec![Key::from(key)])
    }
}

impl<K: Into<Key>> From<Vec<K>> for KeyList {
    fn from(keys: Vec<K>) -> Self {
        Self(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for KeyList {
    fn from(keys: [K; N]) -> Self {
        Self(keys.into_iter().map(Into::into).collect())
    }
}

/// One record or several, as passed to `add`.
///
/// A JSON array converts into one record per element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordBatch(Vec<Value>);

impl RecordBatch {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rejects an empty batch and any record that is not a non-empty
    /// object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the first problem.
    pub fn validate(&self) -> CoreResult<()> {
        if self.0.is_empty() {
            return Err(CoreError::validation("no records given"));
        }
        for (position, record) in self.0.iter().enumerate() {
            match record {
                Value::Object(fields) if fields.is_empty() => {
                    return Err(CoreError::validation(format!(
                        "record {position} is empty"
                    )));
                }
                Value::Object(_) => {}
                _ => {
                    return Err(CoreError::validation(format!(
                        "record {position} is not an object"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the records.
    #[must_use]
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Value> for RecordBatch {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items),
            other => Self(vec![other]),
        }
    }
}

impl From<Vec<Value>> for RecordBatch {
    fn from(records: Vec<Value>) -> Self {
        Self(records)
    }
}

impl From<Record> for RecordBatch {
    fn from(record: Record) -> Self {
        Self(vec![Value::Object(record)])
    }
}

impl From<Vec<Record>> for RecordBatch {
    fn from(records: Vec<Record>) -> Self {
        Self(records.into_iter().map(Value::Object).collect())
    }
}

/// Checks that a partial update is an object.
pub(crate) fn partial_record(partial: Value) -> CoreResult<Record> {
    match partial {
        Value::Object(fields) => Ok(fields),
        _ => Err(CoreError::validation("update payload must be an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_record_becomes_batch_of_one() {
        let batch = RecordBatch::from(json!({"id": 1}));
        assert_eq!(batch.len(), 1);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn array_becomes_many_records() {
        let batch = RecordBatch::from(json!([{"id": 1}, {"id": 2}]));
        assert_eq!(batch.into_vec().len(), 2);
    }

    #[test]
    fn empty_batch_and_empty_record_are_rejected() {
        assert!(RecordBatch::from(json!([])).validate().is_err());
        assert!(RecordBatch::from(Vec::<Value>::new()).validate().is_err());
        assert!(RecordBatch::from(json!({})).validate().is_err());
        assert!(RecordBatch::from(json!([{"id": 1}, {}])).validate().is_err());
        assert!(RecordBatch::from(json!("text")).validate().is_err());
    }

    #[test]
    fn key_list_conversions() {
        assert_eq!(KeyList::from("a").into_vec(), vec![Key::from("a")]);
        assert_eq!(
            KeyList::from(vec!["a".to_string(), "b".to_string()]).len(),
            2
        );
        assert_eq!(KeyList::from([1, 2]).into_vec(), vec![Key::from(1), Key::from(2)]);
        assert!(KeyList::default().is_empty());
    }

    #[test]
    fn partial_must_be_object() {
        assert!(partial_record(json!({"v": 1})).is_ok());
        assert!(partial_record(json!([1])).is_err());
    }
}
