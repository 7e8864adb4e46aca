//! # ShelfDB Engine
//!
//! An embedded, asynchronous, cursor-based record engine.
//!
//! A [`Database`] holds named stores. Each store keeps JSON records ordered
//! by primary key and any number of secondary indexes. All reads and writes
//! go through a [`Transaction`] scoped to one store:
//!
//! - read-only transactions read the last committed state and never wait
//! - read-write transactions on the same store run one at a time
//! - a commit appends one checksummed frame to the log before the new state
//!   becomes visible
//!
//! Schema changes (new stores, new indexes) only happen inside an upgrade
//! step, when the database is opened at a higher version.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelfdb_engine::{Database, Key, OpenOptions, StoreParams, TransactionMode};
//! use shelfdb_storage::InMemoryLog;
//! use serde_json::json;
//!
//! # async fn demo() -> shelfdb_engine::EngineResult<()> {
//! let db = Database::open(OpenOptions::new("app"), Box::new(InMemoryLog::new()), |upgrade| {
//!     upgrade.create_store("time", StoreParams::new().key_path("id"))?;
//!     Ok(())
//! })
//! .await?;
//!
//! let mut txn = db.transaction("time", TransactionMode::ReadWrite).await?;
//! txn.add(json!({"id": "a1", "value": 100}), None)?;
//! txn.commit().await?;
//!
//! let txn = db.transaction("time", TransactionMode::ReadOnly).await?;
//! assert!(txn.get(&Key::from("a1")).is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod database;
mod error;
mod key;
mod keypath;
mod log;
mod range;
mod schema;
mod store;
mod transaction;
mod upgrade;

pub use cursor::{Cursor, CursorSource};
pub use database::{Database, OpenOptions};
pub use error::{EngineError, EngineResult};
pub use key::Key;
pub use keypath::{lookup_path, remove_path, set_path, KeyPath};
pub use range::{Direction, KeyRange};
pub use schema::{IndexParams, StoreParams};
pub use transaction::{Transaction, TransactionMode};
pub use upgrade::{UpgradeStore, UpgradeTransaction};
