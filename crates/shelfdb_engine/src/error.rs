//! Error types for the ShelfDB engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Log backend error.
    #[error("storage error: {0}")]
    Storage(#[from] shelfdb_storage::StorageError),

    /// A log entry could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The log holds a frame that fails validation.
    #[error("log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The database was opened at a version lower than the stored one.
    #[error("requested version {requested} is lower than stored version {current}")]
    Version {
        /// Version the caller asked for.
        requested: u32,
        /// Version persisted in the log.
        current: u32,
    },

    /// No store with this name exists.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the store.
        name: String,
    },

    /// A store with this name already exists.
    #[error("store already exists: {name}")]
    StoreExists {
        /// Name of the store.
        name: String,
    },

    /// No index with this name exists on the store.
    #[error("index {index} not found on store {store}")]
    IndexNotFound {
        /// Name of the store.
        store: String,
        /// Name of the index.
        index: String,
    },

    /// An index with this name already exists on the store.
    #[error("index {index} already exists on store {store}")]
    IndexExists {
        /// Name of the store.
        store: String,
        /// Name of the index.
        index: String,
    },

    /// A primary key or unique index would hold a duplicate.
    #[error("constraint violated: {message}")]
    Constraint {
        /// Description of the violation.
        message: String,
    },

    /// A record, key or argument is not usable.
    #[error("data error: {message}")]
    Data {
        /// Description of the problem.
        message: String,
    },

    /// A write was attempted in a read-only transaction.
    #[error("transaction on store {store} is read-only")]
    ReadOnly {
        /// Name of the store.
        store: String,
    },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates a store-not-found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }

    /// Returns `true` when the error concerns a single request and leaves
    /// the transaction usable.
    ///
    /// Duplicate keys and unusable records fall in this class. Callers that
    /// batch writes skip such records instead of failing the whole batch.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Constraint { .. } | Self::Data { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_are_constraint_and_data() {
        assert!(EngineError::constraint("dup").is_request_error());
        assert!(EngineError::data("bad").is_request_error());
        assert!(!EngineError::store_not_found("x").is_request_error());
        assert!(!EngineError::ReadOnly { store: "x".into() }.is_request_error());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = EngineError::IndexNotFound {
            store: "time".into(),
            index: "by_value".into(),
        };
        assert_eq!(err.to_string(), "index by_value not found on store time");
    }
}
