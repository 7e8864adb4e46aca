//! Record and index keys.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A key that identifies a record or an index entry.
///
/// Keys are totally ordered: every number sorts before every string, and
/// every string before every array. Arrays compare element by element, a
/// shorter array sorting first when it is a prefix of the longer one.
///
/// Arrays only appear as composite index keys. A primary key is always a
/// number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    /// A finite number. `-0.0` is stored as `0.0`.
    Number(f64),
    /// A string.
    Text(String),
    /// A composite key built from several key paths.
    Array(Vec<Key>),
}

impl Key {
    /// Creates a numeric key.
    ///
    /// # Errors
    ///
    /// Returns a data error for NaN.
    pub fn number(value: f64) -> EngineResult<Self> {
        if value.is_nan() {
            return Err(EngineError::data("NaN is not a valid key"));
        }
        Ok(Self::Number(value + 0.0))
    }

    /// Converts a JSON value into a key.
    ///
    /// Numbers, strings and arrays of those convert. Anything else, or an
    /// array holding anything else, yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().and_then(|f| Self::number(f).ok()),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            _ => None,
        }
    }

    /// Converts the key back into a JSON value.
    ///
    /// Integral numbers become JSON integers so that a generated key reads
    /// back as `1`, not `1.0`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
                }
            }
            Self::Text(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    /// Returns `true` for composite keys.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the number if this is a numeric key.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is a text key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Array(_) => 2,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.iter().cmp(b.iter()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn numbers_sort_before_text_before_arrays() {
        let mut keys = vec![
            Key::Array(vec![Key::from(1)]),
            Key::from("a"),
            Key::from(10),
            Key::from(-3),
            Key::from(""),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(-3),
                Key::from(10),
                Key::from(""),
                Key::from("a"),
                Key::Array(vec![Key::from(1)]),
            ]
        );
    }

    #[test]
    fn arrays_compare_elementwise_then_by_length() {
        let short = Key::Array(vec![Key::from(1)]);
        let long = Key::Array(vec![Key::from(1), Key::from("x")]);
        let bigger = Key::Array(vec![Key::from(2)]);
        assert!(short < long);
        assert!(long < bigger);
    }

    #[test]
    fn nan_is_rejected_and_negative_zero_normalized() {
        assert!(Key::number(f64::NAN).is_err());
        let zero = Key::number(-0.0).unwrap();
        assert_eq!(zero, Key::from(0));
        assert_eq!(zero.as_f64().unwrap().to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn from_value_accepts_numbers_strings_and_arrays() {
        assert_eq!(Key::from_value(&json!(5)), Some(Key::from(5)));
        assert_eq!(Key::from_value(&json!("a1")), Some(Key::from("a1")));
        assert_eq!(
            Key::from_value(&json!([1, "b"])),
            Some(Key::Array(vec![Key::from(1), Key::from("b")]))
        );
        assert_eq!(Key::from_value(&json!(true)), None);
        assert_eq!(Key::from_value(&json!(null)), None);
        assert_eq!(Key::from_value(&json!({"a": 1})), None);
        assert_eq!(Key::from_value(&json!([1, null])), None);
    }

    #[test]
    fn integral_numbers_round_trip_as_integers() {
        assert_eq!(Key::from(7).to_value(), json!(7));
        assert_eq!(Key::number(1.5).unwrap().to_value(), json!(1.5));
        assert_eq!(Key::from("x").to_value(), json!("x"));
    }

    proptest! {
        #[test]
        fn ordering_is_total_and_consistent(a in -1.0e9f64..1.0e9, b in -1.0e9f64..1.0e9) {
            let ka = Key::number(a).unwrap();
            let kb = Key::number(b).unwrap();
            prop_assert_eq!(ka.cmp(&kb), kb.cmp(&ka).reverse());
            prop_assert_eq!(ka < kb, a < b);
        }

        #[test]
        fn text_order_matches_string_order(a in ".{0,8}", b in ".{0,8}") {
            prop_assert_eq!(Key::from(a.as_str()).cmp(&Key::from(b.as_str())), a.cmp(&b));
        }
    }
}
