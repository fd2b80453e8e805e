use tsdb_config::DriverOptions;
use tsdb_driver::{NestedTransactionMode, SqliteDriver};
use tsdb_errors::{DriverError, TsdbError};

#[tokio::test]
async fn native_mode_refuses_a_nested_transaction() {
    let driver =
        SqliteDriver::open_with_mode(&DriverOptions::in_memory(), NestedTransactionMode::NativeUnsupported)
            .unwrap();
    driver
        .exec("CREATE TABLE t (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();

    let result = driver
        .transaction(|tx| {
            tx.run("INSERT INTO t (id) VALUES (1)", &[])?;
            let nested = tx.transaction(|inner| inner.run("INSERT INTO t (id) VALUES (2)", &[]));
            match nested {
                Err(TsdbError::Driver(DriverError::NestedTransactionUnsupported)) => Ok(()),
                other => panic!("expected NestedTransactionUnsupported, got {other:?}"),
            }
        })
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn savepoint_mode_allows_nesting() {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();
    driver
        .exec("CREATE TABLE t (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();

    let result = driver
        .transaction(|tx| tx.transaction(|inner| inner.run("INSERT INTO t (id) VALUES (1)", &[])))
        .await;

    assert!(result.is_ok());
}
