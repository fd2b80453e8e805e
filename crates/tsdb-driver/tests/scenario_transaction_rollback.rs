use tsdb_config::DriverOptions;
use tsdb_driver::SqliteDriver;
use tsdb_errors::TsdbError;

async fn open() -> SqliteDriver {
    let driver = SqliteDriver::open(&DriverOptions::in_memory()).unwrap();
    driver
        .exec("CREATE TABLE counters (id INTEGER PRIMARY KEY, n INTEGER NOT NULL)")
        .await
        .unwrap();
    driver
        .run(
            "INSERT INTO counters (id, n) VALUES (1, 0)",
            vec![],
        )
        .await
        .unwrap();
    driver
}

async fn read_n(driver: &SqliteDriver) -> i64 {
    driver
        .query(
            "SELECT n FROM counters WHERE id = 1",
            vec![],
            |row| row.get::<_, i64>(0),
        )
        .await
        .unwrap()[0]
}

#[tokio::test]
async fn a_failed_transaction_leaves_no_partial_effect() {
    let driver = open().await;
    let before = read_n(&driver).await;

    let result: Result<(), TsdbError> = driver
        .transaction(|tx| {
            tx.run("UPDATE counters SET n = n + 1 WHERE id = 1", &[])?;
            Err(TsdbError::InvalidKey("forced rollback".to_string()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(read_n(&driver).await, before);
}

#[tokio::test]
async fn a_committed_transaction_is_visible_after_it_returns() {
    let driver = open().await;
    driver
        .transaction(|tx| {
            tx.run("UPDATE counters SET n = n + 5 WHERE id = 1", &[])?;
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(read_n(&driver).await, 5);
}

#[tokio::test]
async fn nested_savepoint_rollback_only_undoes_the_inner_write() {
    let driver = open().await;

    driver
        .transaction(|tx| {
            tx.run("UPDATE counters SET n = n + 1 WHERE id = 1", &[])?; // n = 1, survives
            let inner: Result<(), TsdbError> = tx.transaction(|nested| {
                nested.run("UPDATE counters SET n = n + 100 WHERE id = 1", &[])?; // n = 101, rolled back
                Err(TsdbError::InvalidKey("forced inner rollback".to_string()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(read_n(&driver).await, 1);
}

#[tokio::test]
async fn nested_savepoint_commit_is_visible_in_the_outer_transaction() {
    let driver = open().await;

    driver
        .transaction(|tx| {
            tx.run("UPDATE counters SET n = n + 1 WHERE id = 1", &[])?;
            tx.transaction(|nested| {
                nested.run("UPDATE counters SET n = n + 10 WHERE id = 1", &[])?;
                Ok(())
            })?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(read_n(&driver).await, 11);
}
