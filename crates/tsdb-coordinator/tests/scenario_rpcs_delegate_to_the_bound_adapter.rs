use std::sync::Arc;

use serde_json::json;
use tsdb_config::{DriverOptions, SchemaMismatchPolicy};
use tsdb_coordinator::{Coordinator, SingleProcessCoordinator};
use tsdb_driver::SqliteDriver;
use tsdb_keys::StorageKey;
use tsdb_persist::{apply_committed_tx, CommittedTx, IndexSpec, LoadSubsetOptions, Mutation, MutationKind};

fn insert(seq: i64, key: &str) -> CommittedTx {
    CommittedTx {
        tx_id: format!("tx-{seq}"),
        term: 1,
        seq,
        row_version: seq,
        mutations: vec![Mutation {
            kind: MutationKind::Insert,
            key: StorageKey::Str(key.to_string()),
            value: Some(json!({"id": key})),
        }],
    }
}

#[tokio::test]
async fn pull_since_rpc_reflects_rows_written_through_the_adapter_directly() {
    let driver = Arc::new(SqliteDriver::open(&DriverOptions::in_memory()).unwrap());
    apply_committed_tx(&driver, "todos", &insert(1, "a")).await.unwrap();

    let coordinator = SingleProcessCoordinator::new(driver);
    let result = coordinator.pull_since("todos", 0).await.unwrap();
    assert_eq!(result.latest_row_version, 1);
    assert_eq!(result.changed_keys, vec![StorageKey::Str("a".to_string())]);
}

#[tokio::test]
async fn ensure_remote_subset_rpc_returns_rows_matching_the_requested_options() {
    let driver = Arc::new(SqliteDriver::open(&DriverOptions::in_memory()).unwrap());
    apply_committed_tx(&driver, "todos", &insert(1, "a")).await.unwrap();
    apply_committed_tx(&driver, "todos", &insert(2, "b")).await.unwrap();

    let coordinator = SingleProcessCoordinator::new(driver);
    let options = LoadSubsetOptions {
        schema_version: 1,
        policy: SchemaMismatchPolicy::Reset,
        ..Default::default()
    };
    let rows = coordinator
        .request_ensure_remote_subset("todos", &options)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn request_ensure_persisted_index_rpc_is_idempotent() {
    let driver = Arc::new(SqliteDriver::open(&DriverOptions::in_memory()).unwrap());
    let coordinator = SingleProcessCoordinator::new(driver);

    let spec = IndexSpec {
        fields: vec!["status".to_string()],
    };
    coordinator
        .request_ensure_persisted_index("todos", "sig-1", &spec)
        .await
        .unwrap();
    coordinator
        .request_ensure_persisted_index("todos", "sig-1", &spec)
        .await
        .unwrap();
}
