//! Cursors over a store or one of its indexes.

use crate::error::{EngineError, EngineResult};
use crate::key::Key;
use crate::range::{Direction, KeyRange};
use crate::transaction::Transaction;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};

/// What a cursor walks over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorSource {
    /// The store's records in primary key order.
    #[default]
    Store,
    /// The named index, in index key order then primary key order.
    Index(String),
}

#[derive(Debug, Clone)]
struct Position {
    key: Key,
    primary_key: Key,
}

/// A cursor borrowed from a [`Transaction`].
///
/// Starts on the first entry in its range and direction. The position is
/// a pair of keys, not a reference into the store, so deleting or updating
/// the current record keeps the cursor where it is.
pub struct Cursor<'t> {
    txn: &'t mut Transaction,
    source: CursorSource,
    range: KeyRange,
    direction: Direction,
    position: Option<Position>,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(
        txn: &'t mut Transaction,
        source: CursorSource,
        range: KeyRange,
        direction: Direction,
    ) -> Self {
        let mut cursor = Self {
            txn,
            source,
            range,
            direction,
            position: None,
        };
        cursor.position = cursor.first();
        cursor
    }

    /// The key at the current position: the index key for index cursors,
    /// the primary key otherwise.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.position.as_ref().map(|p| &p.key)
    }

    /// The primary key of the current record.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Key> {
        self.position.as_ref().map(|p| &p.primary_key)
    }

    /// The current record. `None` when exhausted or after the record was
    /// deleted through this cursor.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        let position = self.position.as_ref()?;
        self.txn.snapshot.records.get(&position.primary_key)
    }

    /// Returns `true` once the cursor has moved past its last entry.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.position.is_none()
    }

    /// Moves to the next entry. Returns `false` when the cursor is
    /// exhausted.
    pub fn continue_(&mut self) -> bool {
        if let Some(current) = self.position.take() {
            self.position = self.after(&current);
        }
        self.position.is_some()
    }

    /// Moves `count` entries forward.
    ///
    /// # Errors
    ///
    /// Returns a data error when `count` is zero.
    pub fn advance(&mut self, count: usize) -> EngineResult<bool> {
        if count == 0 {
            return Err(EngineError::data("advance count must be positive"));
        }
        for _ in 0..count {
            if !self.continue_() {
                break;
            }
        }
        Ok(self.position.is_some())
    }

    /// Deletes the current record. The cursor stays in place.
    ///
    /// # Errors
    ///
    /// Returns an error when exhausted or in a read-only transaction.
    pub fn delete(&mut self) -> EngineResult<bool> {
        let primary = self.current_primary()?;
        self.txn.delete(&primary)
    }

    /// Replaces the current record.
    ///
    /// For in-line stores the new record must carry the same key.
    ///
    /// # Errors
    ///
    /// Returns a data error when the key would change, and the errors of
    /// [`Transaction::put`].
    pub fn update(&mut self, value: Value) -> EngineResult<Key> {
        let primary = self.current_primary()?;
        match self.txn.key_path().cloned() {
            Some(path) => {
                if path.extract(&value).as_ref() != Some(&primary) {
                    return Err(EngineError::data(
                        "cursor update cannot change the record's key",
                    ));
                }
                self.txn.put(value, None)
            }
            None => self.txn.put(value, Some(primary)),
        }
    }

    fn current_primary(&self) -> EngineResult<Key> {
        self.primary_key()
            .cloned()
            .ok_or_else(|| EngineError::data("cursor is exhausted"))
    }

    fn first(&self) -> Option<Position> {
        let forward = self.direction.is_forward();
        match &self.source {
            CursorSource::Store => {
                let records = &self.txn.snapshot.records;
                seek(records, &self.range, None, forward).map(|(key, _)| Position {
                    key: key.clone(),
                    primary_key: key.clone(),
                })
            }
            CursorSource::Index(name) => {
                let entries = &self.txn.snapshot.indexes.get(name)?.entries;
                let (key, owners) = seek(entries, &self.range, None, forward)?;
                let primary = if self.direction == Direction::Prev {
                    owners.last()
                } else {
                    owners.first()
                }?;
                Some(Position {
                    key: key.clone(),
                    primary_key: primary.clone(),
                })
            }
        }
    }

    fn after(&self, current: &Position) -> Option<Position> {
        let forward = self.direction.is_forward();
        match &self.source {
            CursorSource::Store => {
                let records = &self.txn.snapshot.records;
                seek(records, &self.range, Some(&current.key), forward).map(|(key, _)| Position {
                    key: key.clone(),
                    primary_key: key.clone(),
                })
            }
            CursorSource::Index(name) => {
                let entries = &self.txn.snapshot.indexes.get(name)?.entries;
                if !self.direction.is_unique() {
                    if let Some(owners) = entries.get(&current.key) {
                        if let Some(primary) = sibling(owners, &current.primary_key, forward) {
                            return Some(Position {
                                key: current.key.clone(),
                                primary_key: primary.clone(),
                            });
                        }
                    }
                }
                let (key, owners) = seek(entries, &self.range, Some(&current.key), forward)?;
                let primary = if self.direction == Direction::Prev {
                    owners.last()
                } else {
                    owners.first()
                }?;
                Some(Position {
                    key: key.clone(),
                    primary_key: primary.clone(),
                })
            }
        }
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("source", &self.source)
            .field("direction", &self.direction)
            .field("key", &self.key())
            .field("primary_key", &self.primary_key())
            .finish()
    }
}

/// Finds the first entry in `range` strictly after (or before) `from`, or
/// the first entry of the range when `from` is `None`.
fn seek<'m, V>(
    map: &'m BTreeMap<Key, V>,
    range: &KeyRange,
    from: Option<&Key>,
    forward: bool,
) -> Option<(&'m Key, &'m V)> {
    let found = match (from, forward) {
        (Some(key), true) => map.range::<Key, _>((Excluded(key), Unbounded)).next(),
        (Some(key), false) => map.range::<Key, _>((Unbounded, Excluded(key))).next_back(),
        (None, true) => map.range::<Key, _>((range.lower(), Unbounded)).next(),
        (None, false) => map.range::<Key, _>((Unbounded, range.upper())).next_back(),
    };
    found.filter(|(key, _)| range.contains(key))
}

fn sibling<'s>(owners: &'s BTreeSet<Key>, current: &Key, forward: bool) -> Option<&'s Key> {
    if forward {
        owners.range::<Key, _>((Excluded(current), Unbounded)).next()
    } else {
        owners.range::<Key, _>((Unbounded, Excluded(current))).next_back()
    }
}
