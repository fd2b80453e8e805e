//! `SqliteDriver`/`DriverOptions` fixtures: "build me a ready-to-use
//! driver" helpers, narrowed to two flavors — a fast in-memory driver and
//! a `tempfile`-backed one for restart-persistence scenarios.

use std::sync::Arc;

use tempfile::TempDir;
use tsdb_config::DriverOptions;
use tsdb_driver::SqliteDriver;
use tsdb_errors::Result;

/// An in-memory driver, ready to use. Fails the test (via `expect`) rather
/// than returning `Result` — every scenario test needs one unconditionally,
/// and a failure here means the fixture itself is broken, not the scenario
/// under test.
pub fn in_memory_driver() -> Arc<SqliteDriver> {
    Arc::new(SqliteDriver::open(&DriverOptions::in_memory()).expect("open in-memory driver"))
}

/// A driver backed by a file in a fresh temp directory, plus the directory
/// itself (kept alive by the caller) so the same path can be reopened later
/// to simulate a process restart.
pub struct TempDriver {
    pub dir: TempDir,
    pub path: String,
    pub driver: Arc<SqliteDriver>,
}

pub fn temp_driver() -> Result<TempDriver> {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("collection.sqlite3").to_string_lossy().to_string();
    let options = DriverOptions::new(path.clone())?;
    let driver = Arc::new(SqliteDriver::open(&options)?);
    Ok(TempDriver { dir, path, driver })
}

/// Reopen a driver at `path`, simulating a process restart against the same
/// on-disk database.
pub fn reopen_driver(path: &str) -> Result<Arc<SqliteDriver>> {
    let options = DriverOptions::new(path.to_string())?;
    Ok(Arc::new(SqliteDriver::open(&options)?))
}
