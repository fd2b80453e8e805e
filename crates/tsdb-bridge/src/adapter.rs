//! The host-side binding between a bridge collection id and the adapter
//! that actually serves it. [`BoundAdapter`]'s default methods each return
//! [`TsdbError::Unsupported`], so a narrower adapter (used in tests to
//! exercise the `UnsupportedMethod` wire path) only has to override the
//! methods it actually supports, rather than hand-writing a stub for every
//! method it doesn't.

use std::sync::Arc;

use async_trait::async_trait;
use tsdb_config::SchemaMismatchPolicy;
use tsdb_driver::SqliteDriver;
use tsdb_errors::{Result, TsdbError, UnsupportedError};
use tsdb_persist::{CommittedTx, IndexSpec, KeyValueRow, LoadSubsetOptions, PullSinceResult};

#[async_trait]
pub trait BoundAdapter: Send + Sync {
    async fn load_subset(
        &self,
        _schema_version: i64,
        _limit: Option<u64>,
        _policy: SchemaMismatchPolicy,
    ) -> Result<Vec<KeyValueRow>> {
        Err(TsdbError::from(UnsupportedError("loadSubset".to_string())))
    }

    async fn apply_committed_tx(&self, _tx: CommittedTx) -> Result<()> {
        Err(TsdbError::from(UnsupportedError("applyCommittedTx".to_string())))
    }

    async fn ensure_index(&self, _signature: &str, _spec: &IndexSpec) -> Result<()> {
        Err(TsdbError::from(UnsupportedError("ensureIndex".to_string())))
    }

    async fn mark_index_removed(&self, _signature: &str) -> Result<()> {
        Err(TsdbError::from(UnsupportedError("markIndexRemoved".to_string())))
    }

    async fn pull_since(&self, _from_row_version: i64) -> Result<PullSinceResult> {
        Err(TsdbError::from(UnsupportedError("pullSince".to_string())))
    }
}

/// Full support, backed directly by `tsdb-persist`'s free functions against
/// one collection id. The adapter most bridge hosts bind in production.
pub struct SqliteAdapter {
    driver: Arc<SqliteDriver>,
    collection_id: String,
}

impl SqliteAdapter {
    pub fn new(driver: Arc<SqliteDriver>, collection_id: impl Into<String>) -> Self {
        Self {
            driver,
            collection_id: collection_id.into(),
        }
    }
}

#[async_trait]
impl BoundAdapter for SqliteAdapter {
    async fn load_subset(
        &self,
        schema_version: i64,
        limit: Option<u64>,
        policy: SchemaMismatchPolicy,
    ) -> Result<Vec<KeyValueRow>> {
        let options = LoadSubsetOptions {
            schema_version,
            limit,
            policy,
            ..Default::default()
        };
        tsdb_persist::load_subset(&self.driver, &self.collection_id, &options).await
    }

    async fn apply_committed_tx(&self, tx: CommittedTx) -> Result<()> {
        tsdb_persist::apply_committed_tx(&self.driver, &self.collection_id, &tx).await
    }

    async fn ensure_index(&self, signature: &str, spec: &IndexSpec) -> Result<()> {
        tsdb_persist::ensure_index(&self.driver, &self.collection_id, signature, spec).await
    }

    async fn mark_index_removed(&self, signature: &str) -> Result<()> {
        tsdb_persist::mark_index_removed(&self.driver, &self.collection_id, signature).await
    }

    async fn pull_since(&self, from_row_version: i64) -> Result<PullSinceResult> {
        tsdb_persist::pull_since(&self.driver, &self.collection_id, from_row_version).await
    }
}
