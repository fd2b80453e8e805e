use std::sync::Arc;

use tsdb_collection::{CollectionConfig, CollectionMode, PersistedCollection};
use tsdb_config::SchemaMismatchPolicy;
use tsdb_coordinator::{Coordinator, SingleProcessCoordinator};
use tsdb_keys::StorageKey;
use tsdb_persist::{LoadSubsetOptions, Mutation, MutationKind};
use tsdb_testkit::{in_memory_driver, RecordingSink};

fn config(collection_id: &str) -> CollectionConfig {
    CollectionConfig {
        collection_id: collection_id.to_string(),
        schema_version: 1,
        policy: SchemaMismatchPolicy::SyncAbsentError,
        mode: CollectionMode::SyncAbsent,
    }
}

fn load_options() -> LoadSubsetOptions {
    LoadSubsetOptions {
        schema_version: 1,
        policy: SchemaMismatchPolicy::SyncAbsentError,
        ..Default::default()
    }
}

#[tokio::test]
async fn a_local_commit_is_visible_in_the_sink_and_resolves_its_persisted_promise() {
    let driver = in_memory_driver();
    let coordinator: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink = Arc::new(RecordingSink::new());
    let collection = PersistedCollection::new(driver, coordinator, sink.clone(), config("todos"));

    collection.hydrate(load_options()).await.expect("hydrate");

    let tx_id = collection
        .commit_local(
            "tx-1",
            vec![Mutation {
                kind: MutationKind::Insert,
                key: StorageKey::Str("a".to_string()),
                value: Some(serde_json::json!({"title": "write the spec"})),
            }],
        )
        .await
        .expect("commit_local");

    assert_eq!(tx_id, "tx-1");
    assert_eq!(sink.persisted_tx_ids(), vec!["tx-1".to_string()]);
    assert_eq!(
        sink.get(&StorageKey::Str("a".to_string())),
        Some(serde_json::json!({"title": "write the spec"}))
    );
}

#[tokio::test]
async fn a_delete_removes_the_key_from_the_sink() {
    let driver = in_memory_driver();
    let coordinator: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
    let sink = Arc::new(RecordingSink::new());
    let collection = PersistedCollection::new(driver, coordinator, sink.clone(), config("todos"));

    collection.hydrate(load_options()).await.expect("hydrate");
    collection
        .commit_local(
            "tx-1",
            vec![Mutation {
                kind: MutationKind::Insert,
                key: StorageKey::Str("a".to_string()),
                value: Some(serde_json::json!(1)),
            }],
        )
        .await
        .expect("insert");
    collection
        .commit_local(
            "tx-2",
            vec![Mutation {
                kind: MutationKind::Delete,
                key: StorageKey::Str("a".to_string()),
                value: None,
            }],
        )
        .await
        .expect("delete");

    assert_eq!(sink.get(&StorageKey::Str("a".to_string())), None);
}
