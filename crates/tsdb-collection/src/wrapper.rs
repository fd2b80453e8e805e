//! The persisted-collection wrapper (C5): binds a `ReactiveSink` to the
//! `tsdb-persist` adapter through a `tsdb-coordinator::Coordinator`,
//! implementing ordered-apply protocol, gap detection, and
//! local commit path.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tsdb_config::SchemaMismatchPolicy;
use tsdb_coordinator::{CommitEvent, Coordinator};
use tsdb_driver::SqliteDriver;
use tsdb_errors::{Result, TsdbError};
use tsdb_keys::StorageKey;
use tsdb_persist::{CommittedTx, IndexSpec, KeyValueRow, LoadSubsetOptions, Mutation, MutationKind, Predicate};

use crate::index::signature_of;
use crate::sink::{ReactiveSink, SinkChange};
use crate::watermark::{GapCheck, GapWatermark};

/// Bounds how many events a hydrating wrapper buffers before the buffer is
/// considered overflowed (: "bounded queues for hydration
/// buffering"). An overflow does not drop correctness — it is caught by the
/// next `loadSubset`/`collection_status` read the drain performs, since
/// every buffered event is independently idempotent to reapply.
pub const HYDRATION_BUFFER_CAPACITY: usize = 4096;

/// Whether this wrapper is the sole writer (`sync-absent`) or reconciles
/// remote-truth writes arriving from an external sync layer
/// (`sync-present`). Purely descriptive here — both paths (`commit_local`,
/// `ingest_remote_write`) are always available; a caller picks the one
/// matching its configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    SyncAbsent,
    SyncPresent,
}

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub collection_id: String,
    pub schema_version: i64,
    pub policy: SchemaMismatchPolicy,
    pub mode: CollectionMode,
}

/// `idle → hydrating → ready → recovering → ready` (fatal errors take it to
/// `errored`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Idle,
    Hydrating,
    Ready,
    Recovering,
    Errored,
}

#[derive(Debug, Clone)]
enum BufferedEvent {
    RemoteWrite(CommittedTx),
    Commit(CommitEvent),
}

struct Buffering {
    active: bool,
    queue: VecDeque<BufferedEvent>,
}

pub struct PersistedCollection {
    driver: Arc<SqliteDriver>,
    coordinator: Arc<dyn Coordinator>,
    sink: Arc<dyn ReactiveSink>,
    config: CollectionConfig,
    state: Mutex<CollectionState>,
    watermark: Mutex<GapWatermark>,
    buffering: Mutex<Buffering>,
    hydrate_options: Mutex<Option<LoadSubsetOptions>>,
}

impl PersistedCollection {
    pub fn new(
        driver: Arc<SqliteDriver>,
        coordinator: Arc<dyn Coordinator>,
        sink: Arc<dyn ReactiveSink>,
        config: CollectionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            driver,
            coordinator,
            sink,
            config,
            state: Mutex::new(CollectionState::Idle),
            watermark: Mutex::new(GapWatermark::initial()),
            buffering: Mutex::new(Buffering { active: false, queue: VecDeque::new() }),
            hydrate_options: Mutex::new(None),
        })
    }

    pub fn collection_id(&self) -> &str {
        &self.config.collection_id
    }

    pub async fn state(&self) -> CollectionState {
        *self.state.lock().await
    }

    pub async fn watermark(&self) -> GapWatermark {
        *self.watermark.lock().await
    }

    /// steps 1-5: subscribe before loading, buffer concurrent
    /// events while the snapshot loads, install it, then drain the buffer
    /// in arrival order before transitioning to `ready`.
    pub async fn hydrate(self: &Arc<Self>, options: LoadSubsetOptions) -> Result<()> {
        *self.state.lock().await = CollectionState::Hydrating;
        *self.hydrate_options.lock().await = Some(options.clone());
        {
            let mut buffering = self.buffering.lock().await;
            buffering.active = true;
        }

        let rx = self.coordinator.subscribe(&self.config.collection_id);
        self.spawn_subscriber(rx);

        if let Err(err) = self.load_snapshot(&options).await {
            *self.state.lock().await = CollectionState::Errored;
            return Err(err);
        }

        if let Err(err) = self.drain_buffer().await {
            *self.state.lock().await = CollectionState::Errored;
            return Err(err);
        }

        *self.state.lock().await = CollectionState::Ready;
        Ok(())
    }

    async fn load_snapshot(&self, options: &LoadSubsetOptions) -> Result<()> {
        let rows = tsdb_persist::load_subset(&self.driver, &self.config.collection_id, options).await?;
        self.sink.install_snapshot(rows).await?;
        let status = tsdb_persist::collection_status(&self.driver, &self.config.collection_id).await?;
        *self.watermark.lock().await = GapWatermark::new(status.term, status.last_seq, status.last_row_version);
        Ok(())
    }

    fn spawn_subscriber(self: &Arc<Self>, mut rx: broadcast::Receiver<CommitEvent>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => this.on_commit_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            collection_id = %this.config.collection_id,
                            skipped,
                            "subscriber lagged behind tx:committed stream, forcing full reload"
                        );
                        this.on_lagged().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn push_buffered(&self, event: BufferedEvent) -> bool {
        let mut buffering = self.buffering.lock().await;
        if buffering.active {
            if buffering.queue.len() >= HYDRATION_BUFFER_CAPACITY {
                tracing::warn!(
                    collection_id = %self.config.collection_id,
                    "hydration buffer overflowed, oldest buffered event dropped"
                );
                buffering.queue.pop_front();
            }
            buffering.queue.push_back(event);
            true
        } else {
            false
        }
    }

    async fn drain_buffer(&self) -> Result<()> {
        loop {
            let next = {
                let mut buffering = self.buffering.lock().await;
                match buffering.queue.pop_front() {
                    Some(event) => Some(event),
                    None => {
                        buffering.active = false;
                        None
                    }
                }
            };
            match next {
                Some(event) => self.apply_buffered(event).await?,
                None => return Ok(()),
            }
        }
    }

    async fn apply_buffered(&self, event: BufferedEvent) -> Result<()> {
        match event {
            BufferedEvent::RemoteWrite(tx) => self.apply_remote_write(&tx).await,
            BufferedEvent::Commit(event) => {
                self.refresh_keys(&event.changed_keys, &event.deleted_keys).await?;
                let mut watermark = self.watermark.lock().await;
                watermark.advance(event.term, event.seq, event.latest_row_version);
                Ok(())
            }
        }
    }

    /// Sync-present: an externally sourced, already-ordered committed
    /// transaction (e.g. from a server sync layer) is applied through the
    /// adapter and forwarded to the sink.
    pub async fn ingest_remote_write(&self, tx: CommittedTx) -> Result<()> {
        if self.push_buffered(BufferedEvent::RemoteWrite(tx.clone())).await {
            return Ok(());
        }
        self.apply_remote_write(&tx).await
    }

    async fn apply_remote_write(&self, tx: &CommittedTx) -> Result<()> {
        match tsdb_persist::apply_committed_tx(&self.driver, &self.config.collection_id, tx).await {
            Ok(()) => {}
            Err(TsdbError::StaleTransaction { .. }) => return Ok(()),
            Err(other) => return Err(other),
        }
        self.forward_mutations(&tx.mutations).await?;

        let mut watermark = self.watermark.lock().await;
        watermark.advance(tx.term, tx.seq, tx.row_version);
        drop(watermark);

        let event = commit_event_for(tx);
        self.coordinator.publish(&self.config.collection_id, event).await?;
        Ok(())
    }

    async fn forward_mutations(&self, mutations: &[Mutation]) -> Result<()> {
        for mutation in mutations {
            let change = match mutation.kind {
                MutationKind::Insert | MutationKind::Update => SinkChange::Put(KeyValueRow {
                    key: mutation.key.clone(),
                    value: mutation
                        .value
                        .clone()
                        .ok_or_else(|| TsdbError::InvalidKey("insert/update mutation missing a value".to_string()))?,
                }),
                MutationKind::Delete => SinkChange::Delete(mutation.key.clone()),
            };
            self.sink.apply_change(change).await?;
        }
        Ok(())
    }

    /// Sync-absent (or manual) local commit: the wrapper itself assigns
    /// `(term, seq, rowVersion)`, persists, forwards to the sink, publishes
    /// `tx:committed`, and resolves the sink's persisted-promise.
    pub async fn commit_local(&self, tx_id: impl Into<String>, mutations: Vec<Mutation>) -> Result<String> {
        if !self.coordinator.is_leader() {
            return Err(TsdbError::NoLeader { collection_id: self.config.collection_id.clone() });
        }

        let tx_id = tx_id.into();
        let (term, seq, row_version) = {
            let watermark = self.watermark.lock().await;
            (watermark.term, watermark.seq + 1, watermark.row_version + 1)
        };
        let tx = CommittedTx {
            tx_id: tx_id.clone(),
            term,
            seq,
            row_version,
            mutations,
        };

        tsdb_persist::apply_committed_tx(&self.driver, &self.config.collection_id, &tx).await?;
        self.forward_mutations(&tx.mutations).await?;

        let mut watermark = self.watermark.lock().await;
        watermark.advance(term, seq, row_version);
        drop(watermark);

        self.coordinator.publish(&self.config.collection_id, commit_event_for(&tx)).await?;
        self.sink.notify_persisted(&tx_id).await?;
        Ok(tx_id)
    }

    async fn on_commit_event(self: &Arc<Self>, event: CommitEvent) {
        if self.push_buffered(BufferedEvent::Commit(event.clone())).await {
            return;
        }
        if let Err(err) = self.handle_ready_commit_event(&event).await {
            tracing::error!(
                collection_id = %self.config.collection_id,
                error = %err,
                "failed to process tx:committed event"
            );
        }
    }

    async fn handle_ready_commit_event(self: &Arc<Self>, event: &CommitEvent) -> Result<()> {
        let check = {
            let watermark = self.watermark.lock().await;
            watermark.check(event.term, event.seq)
        };
        match check {
            GapCheck::StaleOrDuplicate => Ok(()),
            GapCheck::Expected => {
                self.refresh_keys(&event.changed_keys, &event.deleted_keys).await?;
                let mut watermark = self.watermark.lock().await;
                watermark.advance(event.term, event.seq, event.latest_row_version);
                Ok(())
            }
            GapCheck::Gap => self.recover_from_gap(event).await,
        }
    }

    /// A future `seq` or advanced `term` arrived: issue a single
    /// `pullSince` call, "a single pullSince call
    /// suffices" property.
    async fn recover_from_gap(self: &Arc<Self>, event: &CommitEvent) -> Result<()> {
        *self.state.lock().await = CollectionState::Recovering;

        let term_changed = {
            let watermark = self.watermark.lock().await;
            event.term != watermark.term
        };

        let result = if term_changed {
            self.full_reload().await
        } else {
            let from_row_version = self.watermark.lock().await.row_version;
            let pulled = self.coordinator.pull_since(&self.config.collection_id, from_row_version).await?;
            if pulled.requires_full_reload {
                self.full_reload().await
            } else {
                self.refresh_keys(&pulled.changed_keys, &pulled.deleted_keys).await?;
                let mut watermark = self.watermark.lock().await;
                watermark.advance(event.term, event.seq, pulled.latest_row_version);
                Ok(())
            }
        };

        *self.state.lock().await = CollectionState::Ready;
        result
    }

    async fn full_reload(&self) -> Result<()> {
        let options = {
            self.hydrate_options
                .lock()
                .await
                .clone()
                .expect("full_reload called before the wrapper was ever hydrated")
        };
        self.load_snapshot(&options).await
    }

    async fn on_lagged(self: &Arc<Self>) {
        {
            let buffering = self.buffering.lock().await;
            if buffering.active {
                // A lag before hydration finished installing its first
                // snapshot is resolved by the hydration drain itself.
                return;
            }
        }
        *self.state.lock().await = CollectionState::Recovering;
        if let Err(err) = self.full_reload().await {
            tracing::error!(
                collection_id = %self.config.collection_id,
                error = %err,
                "full reload after a lagged subscriber failed"
            );
        }
        *self.state.lock().await = CollectionState::Ready;
    }

    /// Re-fetch current values for `changed_keys` (via the coordinator's
    /// routed `loadSubset`) and apply `deleted_keys` as deletes. Used by
    /// both the buffered-event drain and gap recovery, since neither
    /// `CommitEvent` nor `PullSinceResult` carry row values — only keys.
    async fn refresh_keys(&self, changed_keys: &[StorageKey], deleted_keys: &[StorageKey]) -> Result<()> {
        if !changed_keys.is_empty() {
            let predicate = Predicate::Or(
                changed_keys
                    .iter()
                    .map(|key| {
                        let encoded = tsdb_keys::encode(key)?;
                        Ok(Predicate::Eq("key".to_string(), serde_json::Value::String(encoded)))
                    })
                    .collect::<Result<Vec<_>>>()?,
            );
            let options = LoadSubsetOptions {
                where_clause: Some(predicate),
                schema_version: self.config.schema_version,
                policy: self.config.policy,
                ..Default::default()
            };
            let rows = self
                .coordinator
                .request_ensure_remote_subset(&self.config.collection_id, &options)
                .await?;
            for row in rows {
                self.sink.apply_change(SinkChange::Put(row)).await?;
            }
        }
        for key in deleted_keys {
            self.sink.apply_change(SinkChange::Delete(key.clone())).await?;
        }
        Ok(())
    }

    /// Computes a stable signature for `spec` and mirrors it into the
    /// adapter via the coordinator ("index mirroring").
    pub async fn register_index(&self, spec: IndexSpec) -> Result<String> {
        let signature = signature_of(&spec);
        self.coordinator
            .request_ensure_persisted_index(&self.config.collection_id, &signature, &spec)
            .await?;
        Ok(signature)
    }

    /// Marks an index removed. Unlike `register_index`, does not
    /// name a coordinator RPC for removal, so this calls the adapter
    /// directly; only the leader node should ever call it in a
    /// multi-process deployment.
    pub async fn remove_index(&self, signature: &str) -> Result<()> {
        tsdb_persist::mark_index_removed(&self.driver, &self.config.collection_id, signature).await
    }
}

fn commit_event_for(tx: &CommittedTx) -> CommitEvent {
    let mut changed_keys = Vec::new();
    let mut deleted_keys = Vec::new();
    for mutation in &tx.mutations {
        match mutation.kind {
            MutationKind::Insert | MutationKind::Update => changed_keys.push(mutation.key.clone()),
            MutationKind::Delete => deleted_keys.push(mutation.key.clone()),
        }
    }
    CommitEvent {
        term: tx.term,
        seq: tx.seq,
        tx_id: tx.tx_id.clone(),
        latest_row_version: tx.row_version,
        requires_full_reload: false,
        changed_keys,
        deleted_keys,
    }
}
