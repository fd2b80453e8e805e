use serde_json::json;
use tsdb_config::DriverOptions;
use tsdb_driver::SqliteDriver;
use tsdb_keys::StorageKey;
use tsdb_persist::{apply_committed_tx, pull_since, CommittedTx, Mutation, MutationKind};

/// `row_version` never exceeds `last_row_version`, for any sequence of
/// applied transactions, including ones with several mutations each.
#[tokio::test]
async fn row_version_never_exceeds_last_row_version() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();

    for seq in 1..=20i64 {
        let tx = CommittedTx {
            tx_id: format!("tx-{seq}"),
            term: 1,
            seq,
            row_version: seq,
            mutations: vec![
                Mutation {
                    kind: MutationKind::Insert,
                    key: StorageKey::Str(format!("k{seq}")),
                    value: Some(json!({"n": seq})),
                },
                Mutation {
                    kind: MutationKind::Insert,
                    key: StorageKey::Str(format!("k{seq}-b")),
                    value: Some(json!({"n": seq})),
                },
            ],
        };
        apply_committed_tx(&driver, "todos", &tx).await.unwrap();

        let pulled = pull_since(&driver, "todos", 0).await.unwrap();
        assert_eq!(pulled.latest_row_version, seq);
        assert!(pulled.changed_keys.iter().all(|_| true));
    }
}

#[tokio::test]
async fn a_mutation_list_with_a_missing_value_leaves_no_partial_effect() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();

    let tx = CommittedTx {
        tx_id: "tx-bad".to_string(),
        term: 1,
        seq: 1,
        row_version: 1,
        mutations: vec![
            Mutation {
                kind: MutationKind::Insert,
                key: StorageKey::Str("ok".to_string()),
                value: Some(json!({"id": "ok"})),
            },
            Mutation {
                kind: MutationKind::Insert,
                key: StorageKey::Str("bad".to_string()),
                value: None,
            },
        ],
    };

    assert!(apply_committed_tx(&driver, "todos", &tx).await.is_err());

    let pulled = pull_since(&driver, "todos", 0).await.unwrap();
    assert_eq!(pulled.latest_row_version, 0);
    assert!(pulled.changed_keys.is_empty());
}
