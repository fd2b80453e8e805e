//! `ReactiveSink`: the minimal trait this wrapper hydrates and replays
//! into, standing in for the user-facing reactive in-memory collection this
//! workspace does not implement. Object-safe (`async_trait`) for the same
//! reason `Coordinator` is: the wrapper is generic over neither, it holds a
//! `dyn ReactiveSink`.

use async_trait::async_trait;
use tsdb_errors::Result;
use tsdb_keys::StorageKey;
use tsdb_persist::KeyValueRow;

/// A single change applied to the sink's in-memory state, mirroring
/// `tsdb_persist::MutationKind` but carrying a resolved value for
/// inserts/updates (the wrapper always has the row's current value on
/// hand by the time it calls this — either from the local commit it is
/// replaying, or from a re-fetched row during gap recovery).
#[derive(Debug, Clone, PartialEq)]
pub enum SinkChange {
    Put(KeyValueRow),
    Delete(StorageKey),
}

/// External collaborator the wrapper drives: install a hydration
/// snapshot, apply one change at a time in arrival order, and learn when
/// a locally originated write has durably committed.
#[async_trait]
pub trait ReactiveSink: Send + Sync {
    /// Replace the sink's entire visible state with `rows`, as a single
    /// atomic commit from the sink's perspective (step 3:
    /// "install returned rows ... as a single hydration commit").
    async fn install_snapshot(&self, rows: Vec<KeyValueRow>) -> Result<()>;

    /// Apply one change. Called once per mutation, in the order the
    /// wrapper observed or re-derived them.
    async fn apply_change(&self, change: SinkChange) -> Result<()>;

    /// A transaction this sink itself originated (via the wrapper's local
    /// commit path) has been durably persisted; resolve whatever
    /// persisted-promise the caller associated with `tx_id`.
    async fn notify_persisted(&self, tx_id: &str) -> Result<()>;
}
