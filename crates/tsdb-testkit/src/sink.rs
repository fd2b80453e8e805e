//! In-memory `ReactiveSink` fake. Stands in for the real reactive
//! collection that is out of scope for this workspace, recording every
//! call so scenario tests can assert on the wrapper's exact replay order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tsdb_collection::{ReactiveSink, SinkChange};
use tsdb_errors::Result;
use tsdb_keys::StorageKey;
use tsdb_persist::KeyValueRow;

#[derive(Debug, Default)]
struct Recorded {
    rows: HashMap<String, serde_json::Value>,
    changes: Vec<SinkChange>,
    persisted: Vec<String>,
    snapshot_installs: usize,
}

fn row_key(key: &StorageKey) -> String {
    tsdb_keys::encode(key).expect("test fixture keys are always encodable")
}

#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current visible rows, keyed by their encoded form so numeric and
    /// string keys never collide in the test's assertions.
    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.state.lock().expect("recording sink mutex poisoned").rows.clone()
    }

    pub fn change_log(&self) -> Vec<SinkChange> {
        self.state.lock().expect("recording sink mutex poisoned").changes.clone()
    }

    pub fn persisted_tx_ids(&self) -> Vec<String> {
        self.state.lock().expect("recording sink mutex poisoned").persisted.clone()
    }

    pub fn snapshot_install_count(&self) -> usize {
        self.state.lock().expect("recording sink mutex poisoned").snapshot_installs
    }

    pub fn get(&self, key: &StorageKey) -> Option<serde_json::Value> {
        self.state
            .lock()
            .expect("recording sink mutex poisoned")
            .rows
            .get(&row_key(key))
            .cloned()
    }
}

#[async_trait]
impl ReactiveSink for RecordingSink {
    async fn install_snapshot(&self, rows: Vec<KeyValueRow>) -> Result<()> {
        let mut state = self.state.lock().expect("recording sink mutex poisoned");
        state.rows.clear();
        for row in rows {
            state.rows.insert(row_key(&row.key), row.value);
        }
        state.snapshot_installs += 1;
        Ok(())
    }

    async fn apply_change(&self, change: SinkChange) -> Result<()> {
        let mut state = self.state.lock().expect("recording sink mutex poisoned");
        match &change {
            SinkChange::Put(row) => {
                state.rows.insert(row_key(&row.key), row.value.clone());
            }
            SinkChange::Delete(key) => {
                state.rows.remove(&row_key(key));
            }
        }
        state.changes.push(change);
        Ok(())
    }

    async fn notify_persisted(&self, tx_id: &str) -> Result<()> {
        self.state
            .lock()
            .expect("recording sink mutex poisoned")
            .persisted
            .push(tx_id.to_string());
        Ok(())
    }
}
