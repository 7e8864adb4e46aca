//! Transactions scoped to one store.

use crate::cursor::{Cursor, CursorSource};
use crate::database::Shared;
use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use crate::keypath::KeyPath;
use crate::log::LogEntry;
use crate::range::{Direction, KeyRange};
use crate::store::{Mutation, StoreState};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only. Never waits for writers.
    ReadOnly,
    /// Reads and writes. One at a time per store.
    ReadWrite,
}

/// A unit of work on one store.
///
/// Writes are staged on a private copy of the store and become visible to
/// other transactions only after [`Transaction::commit`] returns `Ok`.
/// Dropping a transaction without committing discards its writes.
pub struct Transaction {
    shared: Arc<Shared>,
    store: String,
    mode: TransactionMode,
    pub(crate) snapshot: Arc<StoreState>,
    mutations: Vec<Mutation>,
    _writer: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("store", &self.store)
            .field("mode", &self.mode)
            .field("staged", &self.mutations.len())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(
        shared: Arc<Shared>,
        store: String,
        mode: TransactionMode,
        snapshot: Arc<StoreState>,
        writer: Option<OwnedMutexGuard<()>>,
    ) -> Self {
        Self {
            shared,
            store,
            mode,
            snapshot,
            mutations: Vec::new(),
            _writer: writer,
        }
    }

    /// Name of the store this transaction works on.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store
    }

    /// The transaction mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// The store's key path, if keys are in-line.
    #[must_use]
    pub fn key_path(&self) -> Option<&KeyPath> {
        self.snapshot.params.key_path.as_ref()
    }

    /// Whether the store generates keys.
    #[must_use]
    pub fn auto_increment(&self) -> bool {
        self.snapshot.params.auto_increment
    }

    /// Names of the store's indexes, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.snapshot.indexes.keys().cloned().collect()
    }

    /// Returns a copy of the record stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.snapshot.records.get(key).cloned()
    }

    /// Counts records, optionally only those whose key is in `range`.
    #[must_use]
    pub fn count(&self, range: Option<&KeyRange>) -> usize {
        match range {
            None => self.snapshot.records.len(),
            Some(range) => self
                .snapshot
                .records
                .range::<Key, _>((range.lower(), range.upper()))
                .count(),
        }
    }

    /// Inserts a new record.
    ///
    /// `key` must be `None` for stores with an in-line key path.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Constraint`] if the key exists or a unique index
    ///   already holds one of the record's index keys
    /// - [`EngineError::Data`] if no valid key can be determined
    /// - [`EngineError::ReadOnly`] in a read-only transaction
    pub fn add(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        self.write(value, key, true)
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// As [`Transaction::add`], except that an existing key is replaced.
    pub fn put(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        self.write(value, key, false)
    }

    /// Deletes the record under `key`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReadOnly`] in a read-only transaction.
    pub fn delete(&mut self, key: &Key) -> EngineResult<bool> {
        self.ensure_writable()?;
        if !self.snapshot.records.contains_key(key) {
            return Ok(false);
        }
        Arc::make_mut(&mut self.snapshot).remove(key);
        self.mutations.push(Mutation::Delete { key: key.clone() });
        Ok(true)
    }

    /// Opens a cursor positioned on the first entry in `range`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexNotFound`] for an unknown index.
    pub fn open_cursor(
        &mut self,
        source: CursorSource,
        range: Option<KeyRange>,
        direction: Direction,
    ) -> EngineResult<Cursor<'_>> {
        if let CursorSource::Index(index) = &source {
            if !self.snapshot.indexes.contains_key(index) {
                return Err(EngineError::IndexNotFound {
                    store: self.store.clone(),
                    index: index.clone(),
                });
            }
        }
        Ok(Cursor::new(self, source, range.unwrap_or_default(), direction))
    }

    /// Makes staged writes durable and visible.
    ///
    /// Read-only and unchanged transactions complete without touching the
    /// log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log append fails. The store is then left as
    /// it was before the transaction.
    pub async fn commit(self) -> EngineResult<()> {
        let Self {
            shared,
            store,
            mode,
            snapshot,
            mutations,
            _writer,
        } = self;

        if mode == TransactionMode::ReadOnly || mutations.is_empty() {
            return Ok(());
        }

        let count = mutations.len();
        shared
            .append(&LogEntry::Commit {
                store: store.clone(),
                next_key: snapshot.next_key,
                mutations,
            })
            .await?;

        {
            let mut catalog = shared.catalog.write();
            let slot = catalog
                .stores
                .get_mut(&store)
                .ok_or_else(|| EngineError::store_not_found(&store))?;
            slot.data = snapshot;
        }
        debug!(store = %store, mutations = count, "transaction committed");
        Ok(())
    }

    /// Discards staged writes.
    pub fn abort(self) {
        debug!(store = %self.store, discarded = self.mutations.len(), "transaction aborted");
    }

    fn write(&mut self, mut value: Value, key: Option<Key>, no_overwrite: bool) -> EngineResult<Key> {
        self.ensure_writable()?;
        if no_overwrite {
            if let Some(key) = &key {
                if self.snapshot.records.contains_key(key) {
                    return Err(EngineError::constraint(format!("key {key} already exists")));
                }
            }
        }

        let state = Arc::make_mut(&mut self.snapshot);
        let key = state.resolve_key(&mut value, key)?;
        state.insert(key.clone(), value.clone(), no_overwrite)?;
        self.mutations.push(Mutation::Put {
            key: key.clone(),
            value,
        });
        Ok(key)
    }

    fn ensure_writable(&self) -> EngineResult<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(EngineError::ReadOnly {
                store: self.store.clone(),
            }),
        }
    }
}
