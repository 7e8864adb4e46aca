//! Key-addressed operations.

use crate::connection::ShelfDb;
use crate::error::CoreResult;
use crate::executor;
use crate::guard;
use crate::keys::{partial_record, KeyList, RecordBatch};
use serde_json::Value;
use shelfdb_engine::{KeyRange, TransactionMode};
use tracing::{debug, warn};

impl ShelfDb {
    /// Inserts one record or a batch of records.
    ///
    /// A record whose key already exists, or that violates a unique index,
    /// is skipped with a warning. Returns how many records were inserted.
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::Validation`] for an empty batch or an empty
    ///   record, before any transaction opens
    /// - [`crate::CoreError::NotInitialized`]
    /// - [`crate::CoreError::Transaction`] if the transaction fails
    pub async fn add(&self, collection: &str, records: impl Into<RecordBatch>) -> CoreResult<usize> {
        let batch = records.into();
        batch.validate()?;
        let db = self.database()?;

        executor::run(db, collection, TransactionMode::ReadWrite, |txn| {
            let total = batch.len();
            let mut added = 0;
            for record in batch.into_vec() {
                match txn.add(record, None) {
                    Ok(_) => added += 1,
                    Err(err) if err.is_request_error() => {
                        warn!(collection, error = %err, "record not added");
                    }
                    Err(err) => return Err(err),
                }
            }
            debug!(collection, added, total, "add finished");
            Ok(added)
        })
        .await
    }

    /// Looks up records by key, in key order of the request.
    ///
    /// Keys without a record are left out of the result.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::NotInitialized`] or
    /// [`crate::CoreError::Transaction`].
    pub async fn get(&self, collection: &str, keys: impl Into<KeyList>) -> CoreResult<Vec<Value>> {
        let keys = keys.into();
        let db = self.database()?;
        executor::run(db, collection, TransactionMode::ReadOnly, |txn| {
            Ok(keys.iter().filter_map(|key| txn.get(key)).collect())
        })
        .await
    }

    /// Same as [`ShelfDb::get`].
    ///
    /// # Errors
    ///
    /// As [`ShelfDb::get`].
    pub async fn query_by_keys(
        &self,
        collection: &str,
        keys: impl Into<KeyList>,
    ) -> CoreResult<Vec<Value>> {
        self.get(collection, keys).await
    }

    /// Deletes records by key. Returns how many existed.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::NotInitialized`] or
    /// [`crate::CoreError::Transaction`].
    pub async fn delete_by_keys(&self, collection: &str, keys: impl Into<KeyList>) -> CoreResult<usize> {
        let keys = keys.into();
        let db = self.database()?;
        executor::run(db, collection, TransactionMode::ReadWrite, |txn| {
            let mut deleted = 0;
            for key in keys.iter() {
                if txn.delete(key)? {
                    deleted += 1;
                } else {
                    debug!(collection, %key, "nothing to delete");
                }
            }
            Ok(deleted)
        })
        .await
    }

    /// Merges `partial` into each keyed record, never changing its key.
    ///
    /// Missing keys are skipped with a warning. Returns how many records
    /// were updated.
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::Validation`] if `partial` is not an object
    /// - [`crate::CoreError::NotInitialized`]
    /// - [`crate::CoreError::Transaction`] if the transaction fails
    pub async fn update_by_keys(
        &self,
        collection: &str,
        keys: impl Into<KeyList>,
        partial: Value,
    ) -> CoreResult<usize> {
        let keys = keys.into();
        let partial = partial_record(partial)?;
        let db = self.database()?;

        executor::run(db, collection, TransactionMode::ReadWrite, |txn| {
            let key_path = txn.key_path().cloned();
            let mut updated = 0;
            for key in keys.into_vec() {
                let Some(Value::Object(existing)) = txn.get(&key) else {
                    warn!(collection, %key, "no record to update");
                    continue;
                };
                let merged = guard::protect(&existing, &partial, key_path.as_ref());
                let explicit = if key_path.is_some() { None } else { Some(key.clone()) };
                match txn.put(Value::Object(merged), explicit) {
                    Ok(_) => updated += 1,
                    Err(err) if err.is_request_error() => {
                        warn!(collection, %key, error = %err, "record not updated");
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(updated)
        })
        .await
    }

    /// Counts records, optionally within a primary key range.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::NotInitialized`] or
    /// [`crate::CoreError::Transaction`].
    pub async fn count(&self, collection: &str, range: Option<KeyRange>) -> CoreResult<usize> {
        let db = self.database()?;
        executor::run(db, collection, TransactionMode::ReadOnly, |txn| {
            Ok(txn.count(range.as_ref()))
        })
        .await
    }
}
