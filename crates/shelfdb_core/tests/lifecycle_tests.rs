//! Initialization, persistence and failure handling.

use serde_json::json;
use shelfdb_core::{
    Config, CoreError, EngineError, IndexDeclaration, OfflineQueue, ShelfDb, StoreDeclaration,
};
use shelfdb_testkit::{faulty_shelf, sample_timings, telemetry_schema, TestShelf};
use std::sync::Arc;

#[tokio::test]
async fn reinitialize_keeps_key_paths_and_tolerates_existing_indexes() {
    let mut shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("time", sample_timings(2)).await.unwrap();

    // A restarted process declares the same collection with a different key path.
    shelf.reopen(Config::new().name("test"));
    let changed = vec![StoreDeclaration::new("time")
        .key_path("label")
        .index("value")
        .index(IndexDeclaration::new("by_label", "label"))];
    let db = shelf.initialize(&changed).await.unwrap();

    assert_eq!(
        db.store_params("time").unwrap().key_path,
        Some(shelfdb_core::KeyPath::from("id"))
    );
    assert_eq!(
        db.index_names("time"),
        Some(vec!["by_label".to_string(), "value".to_string()])
    );
    assert_eq!(shelf.count("time", None).await.unwrap(), 2);
}

#[tokio::test]
async fn concurrent_initialize_opens_once() {
    let shelf = Arc::new(ShelfDb::open_in_memory(Config::new()));
    let schema = Arc::new(telemetry_schema());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let shelf = Arc::clone(&shelf);
        let schema = Arc::clone(&schema);
        handles.push(tokio::spawn(async move {
            shelf.initialize(&schema).await.map(|db| db.version())
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }
    assert_eq!(shelf.store_list(), vec!["events", "outbox", "time"]);
}

#[tokio::test]
async fn failed_initialize_leaves_handle_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened as a log file.
    let shelf = ShelfDb::open_file(Config::new(), dir.path());

    let err = shelf.initialize(&telemetry_schema()).await.unwrap_err();
    assert!(matches!(err, CoreError::Init { .. }));
    assert!(shelf.store_list().is_empty());
    assert!(matches!(
        shelf.get("time", "a").await,
        Err(CoreError::NotInitialized)
    ));
}

#[tokio::test]
async fn failed_upgrade_makes_no_schema_usable() {
    let shelf = TestShelf::memory();
    let bad = vec![
        StoreDeclaration::new("ok").key_path("id"),
        StoreDeclaration::new("bad").key_path(vec!["a", "b"]),
    ];
    let err = shelf.initialize(&bad).await.unwrap_err();
    assert!(matches!(err, CoreError::Init { source: EngineError::Data { .. } }));
    assert_eq!(shelf.log_bytes().unwrap().len(), 0);

    shelf.initialize(&telemetry_schema()).await.unwrap();
    assert_eq!(shelf.store_list(), vec!["events", "outbox", "time"]);
}

#[tokio::test]
async fn commit_failure_fails_the_whole_call() {
    let (shelf, switch) = faulty_shelf(Config::new());
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("time", sample_timings(2)).await.unwrap();

    switch.trip();
    let err = shelf.add("time", sample_timings(5)).await.unwrap_err();
    assert!(matches!(err, CoreError::Transaction { .. }));

    switch.reset();
    assert_eq!(shelf.count("time", None).await.unwrap(), 2);
    assert_eq!(shelf.add("time", json!({"id": "later"})).await.unwrap(), 1);
}

#[tokio::test]
async fn records_survive_reopen_from_file() {
    let mut shelf = TestShelf::file();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("time", sample_timings(4)).await.unwrap();
    let queue = OfflineQueue::new(&shelf, "outbox");
    queue.enqueue(json!({"batch": [1, 2, 3]})).await.unwrap();
    assert!(shelf.path().unwrap().exists());

    shelf.reopen(Config::new().name("test"));
    assert!(!shelf.is_initialized());
    shelf.initialize(&telemetry_schema()).await.unwrap();

    assert_eq!(shelf.count("time", None).await.unwrap(), 4);
    let queue = OfflineQueue::new(&shelf, "outbox");
    assert_eq!(queue.dequeue().await.unwrap(), Some(json!({"batch": [1, 2, 3]})));
    assert_eq!(queue.enqueue(json!({"batch": []})).await.unwrap(), shelfdb_core::Key::from(2));
}

#[tokio::test]
async fn compaction_keeps_data_and_shrinks_log() {
    let mut shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("time", sample_timings(20)).await.unwrap();
    for _ in 0..5 {
        shelf
            .update_by_keys("time", "t0000", json!({"value": 1}))
            .await
            .unwrap();
    }
    let before = shelf.log_bytes().unwrap().len();
    shelf.compact().await.unwrap();
    assert!(shelf.log_bytes().unwrap().len() < before);

    shelf.reopen(Config::new().name("test"));
    shelf.initialize(&telemetry_schema()).await.unwrap();
    assert_eq!(shelf.count("time", None).await.unwrap(), 20);
    assert_eq!(shelf.get("time", "t0000").await.unwrap()[0]["value"], json!(1));
}
