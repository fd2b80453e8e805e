//! A `Coordinator` decorator that can silently swallow the next N
//! `publish` calls, so a scenario test can force a subscriber to observe a
//! `seq` gap without needing two separate nodes. Delegates every other
//! method straight through to the wrapped coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tsdb_coordinator::{CommitEvent, Coordinator};
use tsdb_errors::Result;
use tsdb_persist::{IndexSpec, KeyValueRow, LoadSubsetOptions, PullSinceResult};

pub struct GapInjectingCoordinator {
    inner: Arc<dyn Coordinator>,
    drop_next: AtomicUsize,
    pull_since_calls: AtomicUsize,
}

impl GapInjectingCoordinator {
    pub fn new(inner: Arc<dyn Coordinator>) -> Self {
        Self {
            inner,
            drop_next: AtomicUsize::new(0),
            pull_since_calls: AtomicUsize::new(0),
        }
    }

    /// The next `count` calls to `publish` are accepted (so `apply_committed_tx`
    /// still runs) but never broadcast, simulating `count` consecutive missed
    /// `tx:committed` events.
    pub fn drop_next_publishes(&self, count: usize) {
        self.drop_next.store(count, Ordering::SeqCst);
    }

    /// How many times `pull_since` has been called, so a gap-recovery
    /// scenario can assert a single call sufficed.
    pub fn pull_since_call_count(&self) -> usize {
        self.pull_since_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Coordinator for GapInjectingCoordinator {
    fn node_id(&self) -> &str {
        self.inner.node_id()
    }

    fn subscribe(&self, collection_id: &str) -> broadcast::Receiver<CommitEvent> {
        self.inner.subscribe(collection_id)
    }

    async fn publish(&self, collection_id: &str, event: CommitEvent) -> Result<()> {
        let pending = self.drop_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.drop_next.store(pending - 1, Ordering::SeqCst);
            tracing::debug!(collection_id, term = event.term, seq = event.seq, "test double dropped publish");
            return Ok(());
        }
        self.inner.publish(collection_id, event).await
    }

    fn is_leader(&self) -> bool {
        self.inner.is_leader()
    }

    async fn ensure_leadership(&self) -> Result<()> {
        self.inner.ensure_leadership().await
    }

    async fn pull_since(&self, collection_id: &str, from_row_version: i64) -> Result<PullSinceResult> {
        self.pull_since_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.pull_since(collection_id, from_row_version).await
    }

    async fn request_ensure_persisted_index(
        &self,
        collection_id: &str,
        signature: &str,
        spec: &IndexSpec,
    ) -> Result<()> {
        self.inner.request_ensure_persisted_index(collection_id, signature, spec).await
    }

    async fn request_ensure_remote_subset(
        &self,
        collection_id: &str,
        options: &LoadSubsetOptions,
    ) -> Result<Vec<KeyValueRow>> {
        self.inner.request_ensure_remote_subset(collection_id, options).await
    }
}
