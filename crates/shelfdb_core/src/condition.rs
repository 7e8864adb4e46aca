//! Scan conditions and options.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use shelfdb_engine::{Direction, KeyRange};
use std::fmt;
use std::sync::Arc;

/// A record filter evaluated on the client side.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Which records a condition scan visits.
#[derive(Clone)]
pub enum Condition {
    /// Records whose key lies in `range`, walked in `direction`. The key is
    /// the index key when scanning an index, the primary key otherwise.
    Range {
        /// Key bounds. `None` visits every record.
        range: Option<KeyRange>,
        /// Walk order.
        direction: Direction,
    },
    /// Every record, in primary key order, filtered by a function. An index
    /// named in the scan options is ignored.
    Predicate(Predicate),
}

impl Condition {
    /// Every record in ascending primary key order.
    #[must_use]
    pub fn all() -> Self {
        Self::Range {
            range: None,
            direction: Direction::Next,
        }
    }

    /// Records within `range`, ascending.
    #[must_use]
    pub fn range(range: KeyRange) -> Self {
        Self::Range {
            range: Some(range),
            direction: Direction::Next,
        }
    }

    /// Records matching `f`.
    #[must_use]
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Changes the walk order of a range condition. Predicate conditions
    /// always scan ascending and are returned unchanged.
    #[must_use]
    pub fn direction(self, direction: Direction) -> Self {
        match self {
            Self::Range { range, .. } => Self::Range { range, direction },
            predicate => predicate,
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { range, direction } => f
                .debug_struct("Range")
                .field("range", range)
                .field("direction", direction)
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Options for condition scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Index to scan instead of the primary key order.
    pub index: Option<String>,
    /// Maximum records to return or change. Queries default to the
    /// configured query limit; write scans default to no limit.
    pub limit: Option<usize>,
    /// Cursor steps between yields in write scans. Defaults to the
    /// configured batch size.
    pub batch_size: Option<usize>,
}

impl ScanOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans the named index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Sets the limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the write-scan chunk size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        if self.limit == Some(0) {
            return Err(CoreError::invalid_condition("limit must be positive"));
        }
        if self.batch_size == Some(0) {
            return Err(CoreError::invalid_condition("batch size must be positive"));
        }
        if self.index.as_deref() == Some("") {
            return Err(CoreError::invalid_condition("index name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direction_applies_to_ranges_only() {
        let condition = Condition::all().direction(Direction::Prev);
        assert!(matches!(
            condition,
            Condition::Range {
                direction: Direction::Prev,
                ..
            }
        ));

        let predicate = Condition::predicate(|_| true).direction(Direction::Prev);
        assert!(matches!(predicate, Condition::Predicate(_)));
    }

    #[test]
    fn predicate_is_callable() {
        let Condition::Predicate(f) = Condition::predicate(|v| v["value"] == json!(1)) else {
            panic!("expected predicate");
        };
        assert!(f(&json!({"value": 1})));
        assert!(!f(&json!({"value": 2})));
    }

    #[test]
    fn zero_limit_and_batch_are_invalid() {
        assert!(ScanOptions::new().limit(0).validate().is_err());
        assert!(ScanOptions::new().batch_size(0).validate().is_err());
        assert!(ScanOptions::new().index("").validate().is_err());
        assert!(ScanOptions::new().index("value").limit(5).batch_size(2).validate().is_ok());
    }

    #[test]
    fn debug_hides_predicate_body() {
        assert_eq!(
            format!("{:?}", Condition::predicate(|_| false)),
            "Predicate(..)"
        );
    }
}
