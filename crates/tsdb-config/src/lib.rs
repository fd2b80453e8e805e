//! Construction-time validation for the persisted collection core.
//!
//! Every other crate accepts a validated [`DriverOptions`] or
//! [`SchemaMismatchPolicy`] rather than re-checking invariants itself — a
//! load-then-validate shape narrowed here to in-memory structs instead of
//! layered YAML (there is no YAML surface in this subsystem; callers build
//! `DriverOptions` programmatically).

use tsdb_errors::{ConfigError, Result, TsdbError};

/// Default SQLite pragmas applied on connection open.
pub const DEFAULT_PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("foreign_keys", "ON"),
];

/// Validated options for constructing a `tsdb-driver::SqliteDriver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    pub database_path: String,
    pragmas: Vec<(String, String)>,
    writer_queue_depth: usize,
}

impl DriverOptions {
    /// Build options pointed at `database_path` with the default pragma set
    /// and a writer queue depth of 1024.
    pub fn new(database_path: impl Into<String>) -> Result<Self> {
        Self::builder(database_path).build()
    }

    /// In-memory database, useful for tests (`tsdb-testkit` wraps this).
    pub fn in_memory() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            pragmas: DEFAULT_PRAGMAS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            writer_queue_depth: 1024,
        }
    }

    pub fn builder(database_path: impl Into<String>) -> DriverOptionsBuilder {
        DriverOptionsBuilder {
            database_path: database_path.into(),
            pragmas: DEFAULT_PRAGMAS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            writer_queue_depth: 1024,
        }
    }

    pub fn pragmas(&self) -> &[(String, String)] {
        &self.pragmas
    }

    pub fn writer_queue_depth(&self) -> usize {
        self.writer_queue_depth
    }
}

pub struct DriverOptionsBuilder {
    database_path: String,
    pragmas: Vec<(String, String)>,
    writer_queue_depth: usize,
}

impl DriverOptionsBuilder {
    /// Override or add a pragma. Validated on `build()`, not here, so
    /// callers can set pragmas in any order.
    pub fn pragma(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.pragmas.iter_mut().find(|(k, _)| *k == name) {
            existing.1 = value;
        } else {
            self.pragmas.push((name, value));
        }
        self
    }

    pub fn writer_queue_depth(mut self, depth: usize) -> Self {
        self.writer_queue_depth = depth;
        self
    }

    pub fn build(self) -> Result<DriverOptions> {
        if self.database_path.trim().is_empty() {
            return Err(TsdbError::Config(ConfigError::EmptyDatabasePath));
        }
        if self.writer_queue_depth == 0 {
            return Err(TsdbError::Config(ConfigError::InvalidQueueDepth));
        }
        for (name, value) in &self.pragmas {
            let pragma_str = format!("{name}={value}");
            if !is_valid_pragma_string(&pragma_str) {
                return Err(TsdbError::Config(ConfigError::InvalidPragma(pragma_str)));
            }
        }
        Ok(DriverOptions {
            database_path: self.database_path,
            pragmas: self.pragmas,
            writer_queue_depth: self.writer_queue_depth,
        })
    }
}

/// `^[A-Za-z0-9_= ]+$` without pulling in the `regex` crate for one
/// character-class check.
fn is_valid_pragma_string(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | ' '))
}

/// Policy governing what happens when an observed `schema_version` differs
/// from the one the caller requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMismatchPolicy {
    /// Default when no server sync is configured: raise on mismatch.
    #[default]
    SyncAbsentError,
    /// Default when server sync is configured: reset silently.
    SyncPresentReset,
    /// Always reset, regardless of sync configuration.
    Reset,
}

impl SchemaMismatchPolicy {
    /// Whether a mismatch under this policy resets the collection (`true`)
    /// or raises [`tsdb_errors::SchemaMismatchError`] (`false`).
    pub fn resets_on_mismatch(self) -> bool {
        !matches!(self, SchemaMismatchPolicy::SyncAbsentError)
    }

    pub fn default_for_sync_presence(sync_configured: bool) -> Self {
        if sync_configured {
            SchemaMismatchPolicy::SyncPresentReset
        } else {
            SchemaMismatchPolicy::SyncAbsentError
        }
    }
}

/// Validated timeout for the bridge's client-side invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTimeout {
    millis: u64,
}

impl BridgeTimeout {
    pub const DEFAULT_MILLIS: u64 = 5_000;

    pub fn new(millis: u64) -> Result<Self> {
        if millis == 0 {
            return Err(TsdbError::Config(ConfigError::InvalidTimeout));
        }
        Ok(Self { millis })
    }

    pub fn millis(self) -> u64 {
        self.millis
    }
}

impl Default for BridgeTimeout {
    fn default() -> Self {
        Self {
            millis: Self::DEFAULT_MILLIS,
        }
    }
}

/// Validates a collection id is non-empty; every adapter entry point and
/// the bridge dispatcher call this before doing anything else.
pub fn validate_collection_id(collection_id: &str) -> Result<()> {
    if collection_id.trim().is_empty() {
        return Err(TsdbError::Config(ConfigError::EmptyCollectionId));
    }
    Ok(())
}
