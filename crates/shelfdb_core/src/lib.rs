//! # ShelfDB
//!
//! Local, transactional, keyed-record storage.
//!
//! One database holds named collections of JSON records. Each collection
//! has an optional primary key path and any number of secondary indexes.
//! This crate provides:
//!
//! - a schema manager that creates declared collections and indexes once
//! - a lazily opened connection handle, [`ShelfDb`]
//! - add/get/update/delete by explicit key
//! - query/update/delete by scanning a key range or a predicate, with
//!   limits and chunked write scans
//! - a key guard that keeps partial updates from changing a record's key
//! - [`OfflineQueue`], a persistent FIFO for undelivered telemetry
//! - [`NetworkTracker`], an injected online/offline state with change
//!   notifications
//!
//! Every operation runs in one transaction on one collection and returns
//! only after that transaction has committed or failed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod condition;
mod config;
mod connection;
mod error;
mod executor;
pub mod guard;
mod keyed;
mod keys;
mod network;
mod queue;
mod scan;
pub mod schema;

pub use condition::{Condition, Predicate, ScanOptions};
pub use config::Config;
pub use connection::{LogFactory, ShelfDb};
pub use error::{CoreError, CoreResult};
pub use keys::{KeyList, Record, RecordBatch};
pub use network::{NetworkState, NetworkSubscription, NetworkTracker};
pub use queue::OfflineQueue;
pub use schema::{IndexDeclaration, StoreDeclaration};

pub use shelfdb_engine::{
    Database, Direction, EngineError, Key, KeyPath, KeyRange, Transaction, TransactionMode,
};
