//! Test fixtures and shelf helpers.
//!
//! Provides shelves that clean up after themselves and the telemetry
//! schema most tests run against.

use serde_json::{json, Value};
use shelfdb_core::{Config, IndexDeclaration, OfflineQueue, ShelfDb, StoreDeclaration};
use shelfdb_storage::{InMemoryLog, LogBackend, StorageResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test shelf with automatic cleanup.
///
/// Both variants can be reopened: the in-memory one keeps its log buffer,
/// the file one keeps its temporary directory.
pub struct TestShelf {
    /// The shelf handle.
    pub shelf: ShelfDb,
    log: Option<InMemoryLog>,
    path: Option<PathBuf>,
    _temp_dir: Option<TempDir>,
}

impl TestShelf {
    /// Creates an in-memory shelf with default configuration.
    pub fn memory() -> Self {
        Self::memory_with(Config::new().name("test"))
    }

    /// Creates an in-memory shelf with `config`.
    pub fn memory_with(config: Config) -> Self {
        let log = InMemoryLog::new();
        Self {
            shelf: shelf_over(config, &log),
            log: Some(log),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a shelf over a log file in a temporary directory.
    pub fn file() -> Self {
        Self::file_with(Config::new().name("test"))
    }

    /// Creates a file-backed shelf with `config`.
    pub fn file_with(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data").join("test.shelf");
        Self {
            shelf: ShelfDb::open_file(config, &path),
            log: None,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the log file path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a copy of the in-memory log, None if file-based.
    pub fn log_bytes(&self) -> Option<Vec<u8>> {
        self.log.as_ref().map(InMemoryLog::bytes)
    }

    /// Replaces the handle with a fresh, uninitialized one over the same
    /// log, as a restarted process would see it.
    pub fn reopen(&mut self, config: Config) {
        self.shelf = match (&self.log, &self.path) {
            (Some(log), _) => shelf_over(config, log),
            (None, Some(path)) => ShelfDb::open_file(config, path),
            (None, None) => unreachable!("test shelf has neither log nor path"),
        };
    }
}

impl std::ops::Deref for TestShelf {
    type Target = ShelfDb;

    fn deref(&self) -> &Self::Target {
        &self.shelf
    }
}

fn shelf_over(config: Config, log: &InMemoryLog) -> ShelfDb {
    let log = log.clone();
    ShelfDb::with_log_factory(config, move || -> StorageResult<Box<dyn LogBackend>> {
        Ok(Box::new(log.clone()))
    })
}

/// The collections a telemetry client declares.
///
/// - `time`: key path `id`, index on `value`
/// - `events`: nested key path `meta.id`, index on `day`, multi-entry
///   index on `tags`
/// - `outbox`: an offline queue
pub fn telemetry_schema() -> Vec<StoreDeclaration> {
    vec![
        StoreDeclaration::new("time").key_path("id").index("value"),
        StoreDeclaration::new("events")
            .key_path("meta.id")
            .index("day")
            .index(IndexDeclaration::new("tags", "tags").multi_entry(true)),
        OfflineQueue::declaration("outbox"),
    ]
}

/// `count` timing samples for the `time` collection, ids `t0000`..
pub fn sample_timings(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| json!({"id": format!("t{i:04}"), "value": i * 10, "label": "render"}))
        .collect()
}

/// `count` events for the `events` collection, spread over seven days.
pub fn sample_events(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "meta": {"id": i, "source": "client"},
                "day": i % 7,
                "tags": if i % 2 == 0 { json!(["even", "sample"]) } else { json!(["sample"]) },
            })
        })
        .collect()
}
