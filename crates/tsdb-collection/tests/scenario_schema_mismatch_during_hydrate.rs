use std::sync::Arc;

use tsdb_collection::{CollectionConfig, CollectionMode, PersistedCollection};
use tsdb_config::SchemaMismatchPolicy;
use tsdb_coordinator::{Coordinator, SingleProcessCoordinator};
use tsdb_errors::TsdbError;
use tsdb_persist::LoadSubsetOptions;
use tsdb_testkit::{in_memory_driver, RecordingSink};

fn config(policy: SchemaMismatchPolicy) -> CollectionConfig {
    CollectionConfig {
        collection_id: "prefs".to_string(),
        schema_version: 2,
        policy,
        mode: CollectionMode::SyncAbsent,
    }
}

fn load_options(schema_version: i64, policy: SchemaMismatchPolicy) -> LoadSubsetOptions {
    LoadSubsetOptions {
        schema_version,
        policy,
        ..Default::default()
    }
}

/// Sync-absent: a mismatched schema version raises rather than silently
/// resetting.
#[tokio::test]
async fn sync_absent_error_policy_raises_on_a_schema_version_mismatch() {
    let driver = in_memory_driver();

    let coordinator: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink = Arc::new(RecordingSink::new());
    let collection = PersistedCollection::new(driver.clone(), coordinator, sink, config(SchemaMismatchPolicy::SyncAbsentError));
    collection
        .hydrate(load_options(1, SchemaMismatchPolicy::SyncAbsentError))
        .await
        .expect("first hydrate creates the collection at schema version 1");

    let coordinator2: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink2 = Arc::new(RecordingSink::new());
    let collection2 = PersistedCollection::new(driver, coordinator2, sink2, config(SchemaMismatchPolicy::SyncAbsentError));

    let err = collection2
        .hydrate(load_options(2, SchemaMismatchPolicy::SyncAbsentError))
        .await
        .expect_err("schema version 2 does not match the persisted version 1 under SyncAbsentError");

    assert!(matches!(err, TsdbError::SchemaMismatch(_)));
}

/// Sync-present: the same mismatch resets the collection instead of
/// raising.
#[tokio::test]
async fn sync_present_reset_policy_silently_resets_on_a_schema_version_mismatch() {
    let driver = in_memory_driver();

    let coordinator: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink = Arc::new(RecordingSink::new());
    let collection = PersistedCollection::new(driver.clone(), coordinator, sink, config(SchemaMismatchPolicy::SyncPresentReset));
    collection
        .hydrate(load_options(1, SchemaMismatchPolicy::SyncPresentReset))
        .await
        .expect("first hydrate creates the collection at schema version 1");

    let coordinator2: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink2 = Arc::new(RecordingSink::new());
    let collection2 = PersistedCollection::new(driver, coordinator2, sink2, config(SchemaMismatchPolicy::SyncPresentReset));

    collection2
        .hydrate(load_options(2, SchemaMismatchPolicy::SyncPresentReset))
        .await
        .expect("a mismatch under SyncPresentReset resets rather than erroring");

    let watermark = collection2.watermark().await;
    assert_eq!(watermark.term, 2, "a reset bumps the term");
}
