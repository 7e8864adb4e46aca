//! Store and index parameters.

use crate::error::{EngineError, EngineResult};
use crate::keypath::KeyPath;
use serde::{Deserialize, Serialize};

/// Parameters a store is created with. Immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreParams {
    /// In-line key path. `None` means keys are supplied out of line.
    pub key_path: Option<KeyPath>,
    /// Whether the store generates numeric keys.
    pub auto_increment: bool,
}

impl StoreParams {
    /// Creates parameters for an out-of-line store without a key generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the in-line key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Sets whether keys are generated.
    #[must_use]
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        if let Some(path) = &self.key_path {
            if path.is_multiple() {
                return Err(EngineError::data("composite primary keys not supported"));
            }
            path.validate()?;
        }
        Ok(())
    }
}

/// Parameters an index is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Path the indexed value is read from.
    pub key_path: KeyPath,
    /// Whether two records may share an index key.
    pub unique: bool,
    /// Whether an array value produces one entry per element.
    pub multi_entry: bool,
}

impl IndexParams {
    /// Creates parameters for a non-unique, single-entry index.
    #[must_use]
    pub fn new(key_path: impl Into<KeyPath>) -> Self {
        Self {
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
        }
    }

    /// Sets the uniqueness flag.
    #[must_use]
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Sets the multi-entry flag.
    #[must_use]
    pub const fn multi_entry(mut self, value: bool) -> Self {
        self.multi_entry = value;
        self
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        if self.multi_entry && self.key_path.is_multiple() {
            return Err(EngineError::data(
                "multi-entry index cannot use a composite key path",
            ));
        }
        self.key_path.validate()
    }
}
