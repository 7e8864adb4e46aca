//! Cursor-scan operations.
//!
//! A scan opens one cursor, over the collection or over one index, and
//! walks it until the cursor runs out or the limit is reached. Queries
//! collect records. Write scans delete or rewrite them and yield to the
//! runtime every `batch_size` cursor steps so a long scan does not starve
//! other tasks.

use crate::condition::{Condition, Predicate, ScanOptions};
use crate::connection::ShelfDb;
use crate::error::{CoreError, CoreResult};
use crate::executor::{self, Scope};
use crate::guard;
use serde_json::Value;
use shelfdb_engine::{
    CursorSource, Database, Direction, EngineResult, Key, KeyPath, KeyRange, Transaction,
    TransactionMode,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// How a condition translates into one cursor.
struct Plan {
    source: CursorSource,
    range: Option<KeyRange>,
    direction: Direction,
    predicate: Option<Predicate>,
}

impl Plan {
    fn new(
        db: &Database,
        collection: &str,
        condition: Condition,
        options: &ScanOptions,
    ) -> CoreResult<Self> {
        if let Some(index) = &options.index {
            // An unknown collection is left for the transaction to report.
            if let Some(names) = db.index_names(collection) {
                if !names.contains(index) {
                    return Err(CoreError::IndexNotFound {
                        collection: collection.to_string(),
                        index: index.clone(),
                    });
                }
            }
        }

        match condition {
            Condition::Range { range, direction } => Ok(Self {
                source: options
                    .index
                    .clone()
                    .map_or(CursorSource::Store, CursorSource::Index),
                range,
                direction,
                predicate: None,
            }),
            Condition::Predicate(predicate) => {
                if let Some(index) = &options.index {
                    warn!(collection, index = %index, "index ignored for predicate scan");
                }
                Ok(Self {
                    source: CursorSource::Store,
                    range: None,
                    direction: Direction::Next,
                    predicate: Some(predicate),
                })
            }
        }
    }

    fn matches(&self, value: &Value) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(value))
    }
}

impl ShelfDb {
    /// Returns records visited by `condition`, at most `limit` of them.
    ///
    /// The limit defaults to the configured query limit.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidCondition`] for a zero limit or batch size
    /// - [`CoreError::IndexNotFound`] for an unknown index
    /// - [`CoreError::NotInitialized`] or [`CoreError::Transaction`]
    pub async fn query_by_condition(
        &self,
        collection: &str,
        condition: Condition,
        options: ScanOptions,
    ) -> CoreResult<Vec<Value>> {
        options.validate()?;
        let db = self.database()?;
        let plan = Plan::new(db, collection, condition, &options)?;
        let limit = options.limit.unwrap_or(self.config.query_limit);

        executor::run(db, collection, TransactionMode::ReadOnly, |txn| {
            let mut cursor = txn.open_cursor(plan.source.clone(), plan.range.clone(), plan.direction)?;
            let mut found = Vec::new();
            while found.len() < limit {
                if let Some(value) = cursor.value() {
                    if plan.matches(value) {
                        found.push(value.clone());
                    }
                }
                if !cursor.continue_() {
                    break;
                }
            }
            debug!(collection, returned = found.len(), limit, "query finished");
            Ok(found)
        })
        .await
    }

    /// Deletes records visited by `condition`. Returns how many.
    ///
    /// No limit applies unless one is set in `options`.
    ///
    /// # Errors
    ///
    /// As [`ShelfDb::query_by_condition`]. A failure aborts the whole scan.
    pub async fn delete_by_condition(
        &self,
        collection: &str,
        condition: Condition,
        options: ScanOptions,
    ) -> CoreResult<usize> {
        options.validate()?;
        let db = self.database()?;
        let plan = Plan::new(db, collection, condition, &options)?;
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size).max(1);

        let mut scope = Scope::begin(db, collection, TransactionMode::ReadWrite).await?;
        match delete_scan(scope.txn(), &plan, options.limit, batch_size).await {
            Ok(deleted) => {
                debug!(collection, deleted, "delete scan finished");
                scope.settle(deleted).await
            }
            Err(err) => scope.fail(err),
        }
    }

    /// Rewrites records visited by `condition`. Returns how many.
    ///
    /// `update_fn` receives the current record and returns a partial
    /// object, merged through the key guard. A non-object result skips the
    /// record with a warning. No limit applies unless one is set.
    ///
    /// # Errors
    ///
    /// As [`ShelfDb::query_by_condition`]. A failure aborts the whole scan.
    pub async fn update_by_condition<F>(
        &self,
        collection: &str,
        condition: Condition,
        options: ScanOptions,
        update_fn: F,
    ) -> CoreResult<usize>
    where
        F: Fn(&Value) -> Value + Send + Sync,
    {
        options.validate()?;
        let db = self.database()?;
        let plan = Plan::new(db, collection, condition, &options)?;
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size).max(1);

        let mut scope = Scope::begin(db, collection, TransactionMode::ReadWrite).await?;
        match update_scan(scope.txn(), &plan, options.limit, batch_size, &update_fn).await {
            Ok(updated) => {
                debug!(collection, updated, "update scan finished");
                scope.settle(updated).await
            }
            Err(err) => scope.fail(err),
        }
    }
}

async fn delete_scan(
    txn: &mut Transaction,
    plan: &Plan,
    limit: Option<usize>,
    batch_size: usize,
) -> EngineResult<usize> {
    let mut cursor = txn.open_cursor(plan.source.clone(), plan.range.clone(), plan.direction)?;
    let mut deleted = 0;
    let mut steps = 0usize;

    while !cursor.is_exhausted() {
        if limit.is_some_and(|limit| deleted >= limit) {
            break;
        }
        if cursor.value().is_some_and(|value| plan.matches(value)) && cursor.delete()? {
            deleted += 1;
        }
        cursor.continue_();

        steps += 1;
        if steps % batch_size == 0 {
            tokio::task::yield_now().await;
        }
    }
    Ok(deleted)
}

async fn update_scan(
    txn: &mut Transaction,
    plan: &Plan,
    limit: Option<usize>,
    batch_size: usize,
    update_fn: &(dyn Fn(&Value) -> Value + Send + Sync),
) -> EngineResult<usize> {
    let key_path = txn.key_path().cloned();
    // An index cursor can meet a rewritten record again under its new index key.
    let mut seen: BTreeSet<Key> = BTreeSet::new();
    let mut cursor = txn.open_cursor(plan.source.clone(), plan.range.clone(), plan.direction)?;
    let mut updated = 0;
    let mut steps = 0usize;

    while !cursor.is_exhausted() {
        if limit.is_some_and(|limit| updated >= limit) {
            break;
        }

        let staged = match (cursor.value(), cursor.primary_key()) {
            (Some(value), Some(primary)) if plan.matches(value) && !seen.contains(primary) => {
                Some((primary.clone(), rewrite(value, update_fn, key_path.as_ref())))
            }
            _ => None,
        };

        if let Some((primary, rewritten)) = staged {
            match rewritten {
                Some(record) => match cursor.update(record) {
                    Ok(_) => {
                        updated += 1;
                        seen.insert(primary);
                    }
                    Err(err) if err.is_request_error() => {
                        warn!(%primary, error = %err, "record not updated");
                    }
                    Err(err) => return Err(err),
                },
                None => warn!(%primary, "update function returned a non-object; record skipped"),
            }
        }
        cursor.continue_();

        steps += 1;
        if steps % batch_size == 0 {
            tokio::task::yield_now().await;
        }
    }
    Ok(updated)
}

fn rewrite(
    current: &Value,
    update_fn: &(dyn Fn(&Value) -> Value + Send + Sync),
    key_path: Option<&KeyPath>,
) -> Option<Value> {
    let Value::Object(existing) = current else {
        return None;
    };
    let Value::Object(patch) = update_fn(current) else {
        return None;
    };
    Some(Value::Object(guard::protect(existing, &patch, key_path)))
}
