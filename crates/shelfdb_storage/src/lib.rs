//! # ShelfDB Storage
//!
//! Append-only log backends for ShelfDB.
//!
//! The engine persists every committed transaction and every schema upgrade
//! as a framed entry appended to a single log. Backends in this crate are
//! **opaque byte logs**: they know nothing about frames, records or stores.
//!
//! ## Available Backends
//!
//! - [`InMemoryLog`] - ephemeral databases and tests
//! - [`FileLog`] - a single file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use shelfdb_storage::{InMemoryLog, LogBackend};
//!
//! let mut log = InMemoryLog::new();
//! let offset = log.append(b"frame").unwrap();
//! assert_eq!(log.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::LogBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileLog;
pub use memory::InMemoryLog;
