//! A persistent FIFO queue over one collection.
//!
//! Telemetry transmitters park batches they could not deliver here and
//! drain them once the network is back.

use crate::connection::ShelfDb;
use crate::error::{CoreError, CoreResult};
use crate::executor;
use crate::network::NetworkTracker;
use crate::schema::StoreDeclaration;
use serde_json::Value;
use shelfdb_engine::{CursorSource, Direction, Key, TransactionMode};
use tracing::{debug, info};

/// FIFO view of an auto-increment collection.
///
/// Entries are ordered by their generated key, so the oldest entry is
/// always first.
#[derive(Debug, Clone, Copy)]
pub struct OfflineQueue<'a> {
    shelf: &'a ShelfDb,
    collection: &'a str,
}

impl<'a> OfflineQueue<'a> {
    /// Declaration for a queue collection: no key path, generated keys.
    #[must_use]
    pub fn declaration(collection: &str) -> StoreDeclaration {
        StoreDeclaration::new(collection).auto_increment(true)
    }

    /// A queue over `collection`, which must have been declared with
    /// [`OfflineQueue::declaration`].
    #[must_use]
    pub fn new(shelf: &'a ShelfDb, collection: &'a str) -> Self {
        Self { shelf, collection }
    }

    /// Appends an entry. Returns its key.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] for an empty object or a non-object, and
    /// the usual transaction errors.
    pub async fn enqueue(&self, entry: Value) -> CoreResult<Key> {
        match &entry {
            Value::Object(fields) if !fields.is_empty() => {}
            _ => return Err(CoreError::validation("queue entry must be a non-empty object")),
        }
        let db = self.shelf.database()?;
        let key = executor::run(db, self.collection, TransactionMode::ReadWrite, |txn| {
            txn.add(entry, None)
        })
        .await?;
        debug!(collection = self.collection, %key, "entry queued");
        Ok(key)
    }

    /// Removes and returns the oldest entry.
    ///
    /// # Errors
    ///
    /// The usual transaction errors.
    pub async fn dequeue(&self) -> CoreResult<Option<Value>> {
        let db = self.shelf.database()?;
        executor::run(db, self.collection, TransactionMode::ReadWrite, |txn| {
            let mut cursor = txn.open_cursor(CursorSource::Store, None, Direction::Next)?;
            let Some(entry) = cursor.value().cloned() else {
                return Ok(None);
            };
            cursor.delete()?;
            Ok(Some(entry))
        })
        .await
    }

    /// Returns the oldest entry without removing it.
    ///
    /// # Errors
    ///
    /// The usual transaction errors.
    pub async fn peek(&self) -> CoreResult<Option<Value>> {
        let db = self.shelf.database()?;
        executor::run(db, self.collection, TransactionMode::ReadOnly, |txn| {
            let cursor = txn.open_cursor(CursorSource::Store, None, Direction::Next)?;
            Ok(cursor.value().cloned())
        })
        .await
    }

    /// Hands entries to `deliver`, oldest first, while `network` reports
    /// online. An entry is removed only when `deliver` returns `true`; the
    /// first `false` stops the drain and leaves that entry queued.
    ///
    /// Returns the number of entries delivered.
    ///
    /// # Errors
    ///
    /// The usual transaction errors.
    pub async fn drain<F>(&self, network: &NetworkTracker, mut deliver: F) -> CoreResult<usize>
    where
        F: FnMut(&Value) -> bool,
    {
        let db = self.shelf.database()?;
        let mut delivered = 0;
        while network.is_online() {
            let sent = executor::run(db, self.collection, TransactionMode::ReadWrite, |txn| {
                let mut cursor = txn.open_cursor(CursorSource::Store, None, Direction::Next)?;
                let Some(entry) = cursor.value() else {
                    return Ok(false);
                };
                if !deliver(entry) {
                    return Ok(false);
                }
                cursor.delete()?;
                Ok(true)
            })
            .await?;
            if !sent {
                break;
            }
            delivered += 1;
        }
        if delivered > 0 {
            info!(collection = self.collection, delivered, "queue drained");
        }
        Ok(delivered)
    }

    /// Number of queued entries.
    ///
    /// # Errors
    ///
    /// The usual transaction errors.
    pub async fn len(&self) -> CoreResult<usize> {
        self.shelf.count(self.collection, None).await
    }

    /// Returns `true` when nothing is queued.
    ///
    /// # Errors
    ///
    /// The usual transaction errors.
    pub async fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkState;
    use crate::Config;
    use serde_json::json;

    #[tokio::test]
    async fn entries_come_out_in_insertion_order() {
        let shelf = ShelfDb::open_in_memory(Config::new());
        shelf
            .initialize(&[OfflineQueue::declaration("outbox")])
            .await
            .unwrap();
        let queue = OfflineQueue::new(&shelf, "outbox");

        assert!(queue.is_empty().await.unwrap());
        assert_eq!(queue.enqueue(json!({"batch": 1})).await.unwrap(), Key::from(1));
        queue.enqueue(json!({"batch": 2})).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        assert_eq!(queue.peek().await.unwrap(), Some(json!({"batch": 1})));
        assert_eq!(queue.dequeue().await.unwrap(), Some(json!({"batch": 1})));
        assert_eq!(queue.dequeue().await.unwrap(), Some(json!({"batch": 2})));
        assert_eq!(queue.dequeue().await.unwrap(), None);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn empty_entries_are_rejected() {
        let shelf = ShelfDb::open_in_memory(Config::new());
        shelf
            .initialize(&[OfflineQueue::declaration("outbox")])
            .await
            .unwrap();
        let queue = OfflineQueue::new(&shelf, "outbox");
        assert!(matches!(
            queue.enqueue(json!({})).await,
            Err(CoreError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn drain_stops_when_offline_or_refused() {
        let shelf = ShelfDb::open_in_memory(Config::new());
        shelf
            .initialize(&[OfflineQueue::declaration("outbox")])
            .await
            .unwrap();
        let queue = OfflineQueue::new(&shelf, "outbox");
        for batch in 1..=4 {
            queue.enqueue(json!({"batch": batch})).await.unwrap();
        }

        let network = NetworkTracker::new(NetworkState::Offline);
        assert_eq!(queue.drain(&network, |_| true).await.unwrap(), 0);
        assert_eq!(queue.len().await.unwrap(), 4);

        network.set_state(NetworkState::Online);
        let mut sent = Vec::new();
        let delivered = queue
            .drain(&network, |entry| {
                if entry["batch"] == json!(3) {
                    return false;
                }
                sent.push(entry.clone());
                true
            })
            .await
            .unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(sent, vec![json!({"batch": 1}), json!({"batch": 2})]);
        assert_eq!(queue.peek().await.unwrap(), Some(json!({"batch": 3})));

        let tracker = network.clone();
        let delivered = queue
            .drain(&network, |_| {
                tracker.set_state(NetworkState::Offline);
                true
            })
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(queue.peek().await.unwrap(), Some(json!({"batch": 4})));
    }
}
