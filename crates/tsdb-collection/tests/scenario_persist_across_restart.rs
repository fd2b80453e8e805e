use std::sync::Arc;

use tsdb_collection::{CollectionConfig, CollectionMode, PersistedCollection};
use tsdb_config::SchemaMismatchPolicy;
use tsdb_coordinator::{Coordinator, SingleProcessCoordinator};
use tsdb_keys::StorageKey;
use tsdb_persist::{LoadSubsetOptions, Mutation, MutationKind};
use tsdb_testkit::{reopen_driver, temp_driver, RecordingSink, TempDriver};

fn config() -> CollectionConfig {
    CollectionConfig {
        collection_id: "notes".to_string(),
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
async fn rows_committed_before_restart_are_visible_after_reopening_the_same_database() {
    let TempDriver { dir, path, driver } = temp_driver().expect("open temp driver");

    {
        let coordinator: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(driver.clone()));
        let sink = Arc::new(RecordingSink::new());
        let collection = PersistedCollection::new(driver.clone(), coordinator, sink.clone(), config());
        collection.hydrate(load_options()).await.expect("hydrate");
        collection
            .commit_local(
                "tx-1",
                vec![Mutation {
                    kind: MutationKind::Insert,
                    key: StorageKey::Str("a".to_string()),
                    value: Some(serde_json::json!({"title": "survive a restart"})),
                }],
            )
            .await
            .expect("commit_local");
    }
    drop(driver);

    let reopened = reopen_driver(&path).expect("reopen driver");
    let coordinator2: Arc<dyn Coordinator> = Arc::new(SingleProcessCoordinator::new(reopened.clone()));
    let sink2 = Arc::new(RecordingSink::new());
    let collection2 = PersistedCollection::new(reopened, coordinator2, sink2.clone(), config());
    collection2.hydrate(load_options()).await.expect("re-hydrate after restart");

    assert_eq!(
        sink2.get(&StorageKey::Str("a".to_string())),
        Some(serde_json::json!({"title": "survive a restart"}))
    );
    drop(dir);
}
