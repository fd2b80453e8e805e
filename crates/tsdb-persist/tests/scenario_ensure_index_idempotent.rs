use tsdb_config::DriverOptions;
use tsdb_driver::SqliteDriver;
use tsdb_persist::{ensure_index, mark_index_removed, IndexSpec};

#[tokio::test]
async fn ensure_index_twice_is_a_no_op() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();
    let spec = IndexSpec {
        fields: vec!["score".to_string()],
    };
    ensure_index(&driver, "todos", "sig-1", &spec).await.unwrap();
    ensure_index(&driver, "todos", "sig-1", &spec).await.unwrap();
}

#[tokio::test]
async fn mark_index_removed_twice_is_a_no_op() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();
    let spec = IndexSpec {
        fields: vec!["score".to_string()],
    };
    ensure_index(&driver, "todos", "sig-1", &spec).await.unwrap();
    mark_index_removed(&driver, "todos", "sig-1").await.unwrap();
    mark_index_removed(&driver, "todos", "sig-1").await.unwrap();
}

#[tokio::test]
async fn mark_index_removed_on_an_unknown_signature_is_a_no_op() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();
    mark_index_removed(&driver, "todos", "never-created").await.unwrap();
}
