//! End-to-end behaviour of key-addressed operations.

use serde_json::json;
use shelfdb_core::{Condition, Config, CoreError, ScanOptions, StoreDeclaration};
use shelfdb_testkit::{init_tracing, sample_events, sample_timings, telemetry_schema, TestShelf};

#[tokio::test]
async fn time_collection_round_trip() {
    init_tracing();
    let shelf = TestShelf::memory();
    shelf
        .initialize(&[StoreDeclaration::new("time").key_path("id").auto_increment(false)])
        .await
        .unwrap();

    assert_eq!(shelf.add("time", json!({"id": "a1", "value": 100})).await.unwrap(), 1);
    assert_eq!(
        shelf.get("time", ["a1", "missing"]).await.unwrap(),
        vec![json!({"id": "a1", "value": 100})]
    );

    let updated = shelf
        .update_by_keys("time", "a1", json!({"id": "zzz", "value": 200}))
        .await
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(
        shelf.get("time", "a1").await.unwrap(),
        vec![json!({"id": "a1", "value": 200})]
    );
    assert!(shelf.get("time", "zzz").await.unwrap().is_empty());

    assert_eq!(shelf.delete_by_keys("time", "a1").await.unwrap(), 1);
    assert!(shelf.get("time", "a1").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_missing_keys_counts_nothing() {
    let shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("time", sample_timings(3)).await.unwrap();

    assert_eq!(shelf.delete_by_keys("time", ["nope", "t0001"]).await.unwrap(), 1);
    assert_eq!(shelf.delete_by_keys("time", "nope").await.unwrap(), 0);
    assert_eq!(shelf.count("time", None).await.unwrap(), 2);
}

#[tokio::test]
async fn add_then_get_returns_equal_records() {
    let shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    let records = sample_timings(5);
    shelf.add("time", records.clone()).await.unwrap();

    let ids: Vec<String> = (0..5).map(|i| format!("t{i:04}")).collect();
    assert_eq!(shelf.get("time", ids).await.unwrap(), records);
}

#[tokio::test]
async fn nested_key_path_is_protected() {
    let shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("events", sample_events(3)).await.unwrap();

    shelf
        .update_by_keys("events", 1, json!({"meta": {"id": 99, "source": "server"}}))
        .await
        .unwrap();
    let found = shelf.get("events", 1).await.unwrap();
    assert_eq!(found[0]["meta"], json!({"id": 1, "source": "server"}));
    assert!(shelf.get("events", 99).await.unwrap().is_empty());
}

#[tokio::test]
async fn multi_entry_index_matches_each_tag() {
    let shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    shelf.add("events", sample_events(10)).await.unwrap();

    let even = shelf
        .query_by_condition(
            "events",
            Condition::range(shelfdb_core::KeyRange::only("even")),
            ScanOptions::new().index("tags"),
        )
        .await
        .unwrap();
    assert_eq!(even.len(), 5);
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_transaction() {
    let shelf = TestShelf::memory();
    shelf.initialize(&telemetry_schema()).await.unwrap();
    let err = shelf.add("time", Vec::<serde_json::Value>::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    let err = shelf.add("time", json!([{"id": "x"}, {}])).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(shelf.count("time", None).await.unwrap(), 0);
}

#[tokio::test]
async fn pinned_version_opens_without_upgrade_bump() {
    let shelf = TestShelf::memory_with(Config::new().version(5));
    let db = shelf.initialize(&telemetry_schema()).await.unwrap();
    assert_eq!(db.version(), 5);
}
