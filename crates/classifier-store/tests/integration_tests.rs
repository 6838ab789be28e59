//! Integration tests for classifier-store
//!
//! These tests verify the record lifecycle, at-most-once result persistence
//! and cascade deletes against a real SQLite database.

use classifier_domain::traits::RecordStore;
use classifier_domain::{
    ClassificationResult, Field, FieldValue, NewRecord, PersistOutcome, RecordId,
};
use classifier_store::{SqliteStore, StoreError};

fn sample_record(title: &str) -> NewRecord {
    NewRecord::new()
        .with_field("title", title)
        .with_field("user_id", 42i64)
        .with_field("score", 0.75)
        .with_field("published", true)
        .with_field("summary", FieldValue::Null)
}

fn sentiment(score: i64, reason: &str) -> ClassificationResult {
    ClassificationResult::new(vec![
        Field::new("sentiment", score),
        Field::new("reason", reason),
    ])
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_insert_and_get_record() {
    let mut store = SqliteStore::in_memory().unwrap();

    let id = store.insert_record(sample_record("Hello")).unwrap();
    let record = store.get_record(id).unwrap().expect("record should exist");

    assert_eq!(record.id, id);
    assert_eq!(record.fields, sample_record("Hello").fields);
    assert!(record.created_at > 0);
}

#[test]
fn test_binary_fields_round_trip() {
    let mut store = SqliteStore::in_memory().unwrap();
    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 1, 2];

    let id = store
        .insert_record(NewRecord::new().with_field("image", png.clone()))
        .unwrap();
    let record = store.get_record(id).unwrap().unwrap();

    assert_eq!(record.get("image"), Some(&FieldValue::Binary(png)));
}

#[test]
fn test_get_missing_record() {
    let store = SqliteStore::in_memory().unwrap();
    assert!(store.get_record(RecordId::new(999)).unwrap().is_none());
}

#[test]
fn test_list_record_ids_in_order() {
    let mut store = SqliteStore::in_memory().unwrap();
    let a = store.insert_record(sample_record("a")).unwrap();
    let b = store.insert_record(sample_record("b")).unwrap();
    let c = store.insert_record(sample_record("c")).unwrap();

    assert_eq!(store.list_record_ids().unwrap(), vec![a, b, c]);
}

#[test]
fn test_persist_result_once() {
    let mut store = SqliteStore::in_memory().unwrap();
    let id = store.insert_record(sample_record("x")).unwrap();

    assert!(!store.has_result(id).unwrap());

    let first = store.persist_result_once(id, &sentiment(4, "upbeat")).unwrap();
    assert_eq!(first, PersistOutcome::Inserted);
    assert!(store.has_result(id).unwrap());

    // Second attempt is discarded and the first result is kept
    let second = store.persist_result_once(id, &sentiment(1, "gloomy")).unwrap();
    assert_eq!(second, PersistOutcome::AlreadyExists);

    let stored = store.get_result(id).unwrap().unwrap();
    assert_eq!(stored.record_id, id);
    assert_eq!(stored.result, sentiment(4, "upbeat"));
    assert_eq!(store.count_results().unwrap(), 1);
}

#[test]
fn test_persist_result_for_missing_record() {
    let mut store = SqliteStore::in_memory().unwrap();

    let result = store.persist_result_once(RecordId::new(12), &sentiment(3, "meh"));
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == RecordId::new(12)));
    assert_eq!(store.count_results().unwrap(), 0);
}

#[test]
fn test_non_finite_float_result_is_rejected() {
    let mut store = SqliteStore::in_memory().unwrap();
    let id = store.insert_record(sample_record("x")).unwrap();
    let result = ClassificationResult::new(vec![
        Field::new("label", "spam"),
        Field::new("confidence", f64::NAN),
    ]);

    let err = store.persist_result_once(id, &result).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(ref msg) if msg.contains("confidence")));
    assert!(!store.has_result(id).unwrap());
    assert_eq!(store.count_results().unwrap(), 0);

    let retry = ClassificationResult::new(vec![Field::new("confidence", 0.5)]);
    assert_eq!(store.persist_result_once(id, &retry).unwrap(), PersistOutcome::Inserted);
}

#[test]
fn test_result_null_values_round_trip() {
    let mut store = SqliteStore::in_memory().unwrap();
    let id = store.insert_record(sample_record("x")).unwrap();
    let result = ClassificationResult::new(vec![
        Field::new("label", "spam"),
        Field::new("confidence", FieldValue::Null),
    ]);

    store.persist_result_once(id, &result).unwrap();

    let stored = store.get_result(id).unwrap().unwrap();
    assert_eq!(stored.result.get("confidence"), Some(&FieldValue::Null));
}

#[test]
fn test_delete_record_cascades_to_result() {
    let mut store = SqliteStore::in_memory().unwrap();
    let keep = store.insert_record(sample_record("keep")).unwrap();
    let gone = store.insert_record(sample_record("drop")).unwrap();
    store.persist_result_once(keep, &sentiment(5, "great")).unwrap();
    store.persist_result_once(gone, &sentiment(2, "poor")).unwrap();

    assert!(store.delete_record(gone).unwrap());

    assert!(store.get_record(gone).unwrap().is_none());
    assert!(store.get_result(gone).unwrap().is_none());
    assert!(!store.has_result(gone).unwrap());
    assert!(store.get_result(keep).unwrap().is_some());
    assert_eq!(store.count_results().unwrap(), 1);
}

#[test]
fn test_delete_missing_record() {
    let mut store = SqliteStore::in_memory().unwrap();
    assert!(!store.delete_record(RecordId::new(5)).unwrap());
}

#[test]
fn test_results_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.db");

    let id = {
        let mut store = SqliteStore::new(&path).unwrap();
        let id = store.insert_record(sample_record("persisted")).unwrap();
        store.persist_result_once(id, &sentiment(3, "neutral")).unwrap();
        id
    };

    // A fresh connection sees the committed result and still refuses a second one
    let mut store = SqliteStore::new(&path).unwrap();
    assert_eq!(
        store.persist_result_once(id, &sentiment(5, "late")).unwrap(),
        PersistOutcome::AlreadyExists
    );
    assert_eq!(
        store.get_result(id).unwrap().unwrap().result,
        sentiment(3, "neutral")
    );
}

#[test]
fn test_two_connections_share_one_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let mut first = SqliteStore::new(&path).unwrap();
    let mut second = SqliteStore::new(&path).unwrap();
    let id = first.insert_record(sample_record("shared")).unwrap();

    let a = first.persist_result_once(id, &sentiment(1, "first")).unwrap();
    let b = second.persist_result_once(id, &sentiment(2, "second")).unwrap();

    assert_eq!(a, PersistOutcome::Inserted);
    assert_eq!(b, PersistOutcome::AlreadyExists);
    assert_eq!(second.count_results().unwrap(), 1);
}
