//! Key paths: where a record keeps its key.
//!
//! A path is a dot-separated list of field names. `"id"` reads the `id`
//! field, `"meta.id"` reads `id` inside the `meta` object.

use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single field path or a list of paths forming a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// One field path.
    Single(String),
    /// Several field paths; the key is the array of their values.
    Multiple(Vec<String>),
}

impl KeyPath {
    /// Returns the field paths this key path reads.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::Single(path) => vec![path.as_str()],
            Self::Multiple(paths) => paths.iter().map(String::as_str).collect(),
        }
    }

    /// Returns `true` for composite key paths.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }

    /// Checks that every path is non-empty and has no empty segment.
    ///
    /// # Errors
    ///
    /// Returns a data error naming the offending path.
    pub fn validate(&self) -> EngineResult<()> {
        if let Self::Multiple(paths) = self {
            if paths.is_empty() {
                return Err(EngineError::data("composite key path has no fields"));
            }
        }
        for path in self.paths() {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(EngineError::data(format!("invalid key path: {path:?}")));
            }
        }
        Ok(())
    }

    /// Extracts the key from a record.
    ///
    /// A composite path yields an array key and needs every field present.
    #[must_use]
    pub fn extract(&self, record: &Value) -> Option<Key> {
        let object = record.as_object()?;
        match self {
            Self::Single(path) => lookup_path(object, path).and_then(Key::from_value),
            Self::Multiple(paths) => paths
                .iter()
                .map(|path| lookup_path(object, path).and_then(Key::from_value))
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self::Single(path.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        Self::Single(path)
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(paths: Vec<String>) -> Self {
        Self::Multiple(paths)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(paths: Vec<&str>) -> Self {
        Self::Multiple(paths.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(paths: [&str; N]) -> Self {
        Self::Multiple(paths.iter().map(|p| (*p).to_string()).collect())
    }
}

/// Reads the value at a dotted path.
#[must_use]
pub fn lookup_path<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate objects.
///
/// An intermediate field holding a non-object is replaced by an object.
pub fn set_path(record: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = record;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => current = map,
            _ => return,
        }
    }
    current.insert(last.to_string(), value);
}

/// Removes the value at a dotted path, returning it.
pub fn remove_path(record: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => record.remove(path),
        Some((head, rest)) => match record.get_mut(head)? {
            Value::Object(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn lookup_follows_dots() {
        let record = object(json!({"id": 1, "meta": {"id": "m"}}));
        assert_eq!(lookup_path(&record, "id"), Some(&json!(1)));
        assert_eq!(lookup_path(&record, "meta.id"), Some(&json!("m")));
        assert_eq!(lookup_path(&record, "meta.missing"), None);
        assert_eq!(lookup_path(&record, "id.deeper"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut record = object(json!({"meta": 3}));
        set_path(&mut record, "a.b", json!(1));
        set_path(&mut record, "meta.id", json!("x"));
        assert_eq!(
            Value::Object(record),
            json!({"a": {"b": 1}, "meta": {"id": "x"}})
        );
    }

    #[test]
    fn remove_returns_old_value() {
        let mut record = object(json!({"id": 1, "meta": {"id": 2, "keep": true}}));
        assert_eq!(remove_path(&mut record, "meta.id"), Some(json!(2)));
        assert_eq!(remove_path(&mut record, "nope.id"), None);
        assert_eq!(Value::Object(record), json!({"id": 1, "meta": {"keep": true}}));
    }

    #[test]
    fn extract_single_and_composite() {
        let record = json!({"id": "a1", "day": 3, "tag": "x"});
        assert_eq!(KeyPath::from("id").extract(&record), Some(Key::from("a1")));
        assert_eq!(
            KeyPath::from(["day", "tag"]).extract(&record),
            Some(Key::Array(vec![Key::from(3), Key::from("x")]))
        );
        assert_eq!(KeyPath::from(["day", "missing"]).extract(&record), None);
        assert_eq!(KeyPath::from("id").extract(&json!("scalar")), None);
    }

    #[test]
    fn validate_rejects_empty_segments() {
        assert!(KeyPath::from("a.b").validate().is_ok());
        assert!(KeyPath::from("").validate().is_err());
        assert!(KeyPath::from("a..b").validate().is_err());
        assert!(KeyPath::Multiple(Vec::new()).validate().is_err());
    }

    #[test]
    fn serde_accepts_string_or_list() {
        let single: KeyPath = serde_json::from_value(json!("id")).unwrap();
        let multiple: KeyPath = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(single, KeyPath::from("id"));
        assert_eq!(multiple, KeyPath::from(["a", "b"]));
    }
}
