//! Error types for ShelfDB.

use shelfdb_engine::EngineError;
use thiserror::Error;

/// Result type for ShelfDB operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by [`crate::ShelfDb`] operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An operation ran before a successful `initialize`.
    #[error("database is not initialized")]
    NotInitialized,

    /// The input was rejected before any transaction opened.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// A scan named an index the collection does not have.
    #[error("index {index} not found on collection {collection}")]
    IndexNotFound {
        /// Name of the collection.
        collection: String,
        /// Name of the index.
        index: String,
    },

    /// A scan condition or its options are unusable.
    #[error("invalid condition: {message}")]
    InvalidCondition {
        /// Description of the problem.
        message: String,
    },

    /// The transaction failed or aborted.
    #[error("transaction on {collection} failed: {source}")]
    Transaction {
        /// Name of the collection.
        collection: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// Opening or upgrading the database failed.
    #[error("initialization failed: {source}")]
    Init {
        /// Engine failure.
        #[from]
        source: EngineError,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid condition error.
    pub fn invalid_condition(message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            message: message.into(),
        }
    }

    /// Creates a transaction error for `collection`.
    pub fn transaction(collection: impl Into<String>, source: EngineError) -> Self {
        Self::Transaction {
            collection: collection.into(),
            source,
        }
    }

    /// Returns `true` for errors raised before any transaction opened.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::IndexNotFound { .. } | Self::InvalidCondition { .. }
        )
    }
}
