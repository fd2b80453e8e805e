use serde_json::json;
use tsdb_config::{DriverOptions, SchemaMismatchPolicy};
use tsdb_driver::SqliteDriver;
use tsdb_keys::StorageKey;
use tsdb_persist::{apply_committed_tx, load_subset, CommittedTx, LoadSubsetOptions, Mutation, MutationKind};

#[tokio::test]
async fn persist_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("collection.sqlite3");
    let db_path_str = db_path.to_str().unwrap().to_string();

    {
        let driver = SqliteDriver::open(&DriverOptions::new(db_path_str.clone()).unwrap()).unwrap();
        let tx = CommittedTx {
            tx_id: "tx-1".to_string(),
            term: 1,
            seq: 1,
            row_version: 1,
            mutations: vec![Mutation {
                kind: MutationKind::Insert,
                key: StorageKey::Str("persisted".to_string()),
                value: Some(json!({"id": "persisted", "title": "Survives restart", "score": 42})),
            }],
        };
        apply_committed_tx(&driver, "todos", &tx).await.unwrap();
    }

    let driver = SqliteDriver::open(&DriverOptions::new(db_path_str).unwrap()).unwrap();
    let options = LoadSubsetOptions {
        schema_version: 0,
        policy: SchemaMismatchPolicy::SyncAbsentError,
        ..Default::default()
    };
    let rows = load_subset(&driver, "todos", &options).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, StorageKey::Str("persisted".to_string()));

    let pulled = tsdb_persist::pull_since(&driver, "todos", 0).await.unwrap();
    assert!(pulled.latest_row_version >= 1);
}
