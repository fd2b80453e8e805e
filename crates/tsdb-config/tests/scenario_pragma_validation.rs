use tsdb_config::DriverOptions;
use tsdb_errors::{ConfigError, TsdbError};

#[test]
fn rejects_pragma_with_semicolon() {
    let err = DriverOptions::builder("db.sqlite3")
        .pragma("journal_mode", "WAL; DROP TABLE users")
        .build()
        .unwrap_err();

    match err {
        TsdbError::Config(ConfigError::InvalidPragma(p)) => {
            assert!(p.contains("DROP TABLE"));
        }
        other => panic!("expected InvalidPragma, got {other:?}"),
    }
}

#[test]
fn rejects_pragma_with_comment_marker() {
    let err = DriverOptions::builder("db.sqlite3")
        .pragma("synchronous", "NORMAL -- comment")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        TsdbError::Config(ConfigError::InvalidPragma(_))
    ));
}

#[test]
fn accepts_default_pragmas() {
    let opts = DriverOptions::new("db.sqlite3").expect("defaults must validate");
    let names: Vec<_> = opts.pragmas().iter().map(|(k, _)| k.as_str()).collect();
    assert!(names.contains(&"journal_mode"));
    assert!(names.contains(&"synchronous"));
    assert!(names.contains(&"foreign_keys"));
}

#[test]
fn rejects_empty_database_path() {
    let err = DriverOptions::builder("   ").build().unwrap_err();
    assert!(matches!(
        err,
        TsdbError::Config(ConfigError::EmptyDatabasePath)
    ));
}

#[test]
fn rejects_zero_writer_queue_depth() {
    let err = DriverOptions::builder("db.sqlite3")
        .writer_queue_depth(0)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        TsdbError::Config(ConfigError::InvalidQueueDepth)
    ));
}
