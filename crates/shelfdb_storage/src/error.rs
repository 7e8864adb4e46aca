//! Error types for log backends.

use std::io;
use thiserror::Error;

/// Result type for log backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::LogBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended beyond the end of the log.
    #[error("read beyond end of log: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current log size.
        size: u64,
    },

    /// A truncation asked to grow the log.
    #[error("cannot truncate log of {size} bytes to {requested} bytes")]
    InvalidTruncate {
        /// Requested length.
        requested: u64,
        /// Current log size.
        size: u64,
    },

    /// The log was closed or its backing resource is gone.
    #[error("log is closed")]
    Closed,
}
