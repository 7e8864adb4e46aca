//! Key ranges and scan directions.

use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use std::ops::Bound;

/// A contiguous range of keys.
///
/// Either end may be open, closed, or absent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// A range matching every key.
    #[must_use]
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// A range matching exactly one key.
    #[must_use]
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys at or above `key`, or strictly above it when `open`.
    #[must_use]
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: bound(key.into(), open),
            upper: Bound::Unbounded,
        }
    }

    /// Keys at or below `key`, or strictly below it when `open`.
    #[must_use]
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: bound(key.into(), open),
        }
    }

    /// Keys between `lower` and `upper`.
    ///
    /// # Errors
    ///
    /// Returns a data error when `lower > upper`, or when they are equal and
    /// either end is open.
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> EngineResult<Self> {
        let lower = lower.into();
        let upper = upper.into();
        if lower > upper || (lower == upper && (lower_open || upper_open)) {
            return Err(EngineError::data(format!(
                "empty key range: lower {lower} upper {upper}"
            )));
        }
        Ok(Self {
            lower: bound(lower, lower_open),
            upper: bound(upper, upper_open),
        })
    }

    /// The lower end.
    #[must_use]
    pub fn lower(&self) -> Bound<&Key> {
        self.lower.as_ref()
    }

    /// The upper end.
    #[must_use]
    pub fn upper(&self) -> Bound<&Key> {
        self.upper.as_ref()
    }

    /// Returns `true` if `key` falls inside the range.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(lower) => key >= lower,
            Bound::Excluded(lower) => key > lower,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(upper) => key <= upper,
            Bound::Excluded(upper) => key < upper,
            Bound::Unbounded => true,
        };
        above && below
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

fn bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

/// Cursor iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending, every entry.
    #[default]
    Next,
    /// Ascending, first entry of each distinct key.
    NextUnique,
    /// Descending, every entry.
    Prev,
    /// Descending, first entry of each distinct key.
    PrevUnique,
}

impl Direction {
    /// Returns `true` for ascending directions.
    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Next | Self::NextUnique)
    }

    /// Returns `true` for directions that skip duplicate keys.
    #[must_use]
    pub const fn is_unique(self) -> bool {
        matches!(self, Self::NextUnique | Self::PrevUnique)
    }
}
