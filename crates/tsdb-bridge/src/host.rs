//! Host-side dispatcher: validates a [`Request`], routes it to the
//! [`BoundAdapter`] registered for its `collectionId`, and always returns a
//! [`Response`] rather than letting a call fail outright — the mapping from
//! every internal failure to a wire-safe [`WireError`] lives entirely here.

use std::collections::HashMap;
use std::sync::Arc;

use tsdb_config::SchemaMismatchPolicy;
use tsdb_errors::{BridgeError, ProtocolError, TsdbError};
use tsdb_persist::{CommittedTx, IndexSpec, KeyValueRow, Mutation, MutationKind, PullSinceResult};

use crate::adapter::BoundAdapter;
use crate::envelope::{
    BridgeMethod, Request, Response, WireCommittedTx, WireError, WireKeyValueRow, WireMutation, WireMutationKind,
    WirePullSinceResult, PROTOCOL_VERSION,
};

fn mutation_from_wire(wire: WireMutation) -> Mutation {
    let kind = match wire.kind {
        WireMutationKind::Insert => MutationKind::Insert,
        WireMutationKind::Update => MutationKind::Update,
        WireMutationKind::Delete => MutationKind::Delete,
    };
    Mutation {
        kind,
        key: wire.key,
        value: wire.value,
    }
}

fn tx_from_wire(wire: WireCommittedTx) -> CommittedTx {
    CommittedTx {
        tx_id: wire.tx_id,
        term: wire.term,
        seq: wire.seq,
        row_version: wire.row_version,
        mutations: wire.mutations.into_iter().map(mutation_from_wire).collect(),
    }
}

fn row_to_wire(row: KeyValueRow) -> WireKeyValueRow {
    WireKeyValueRow {
        key: row.key,
        value: row.value,
    }
}

fn pull_since_to_wire(result: PullSinceResult) -> WirePullSinceResult {
    WirePullSinceResult {
        latest_row_version: result.latest_row_version,
        requires_full_reload: result.requires_full_reload,
        changed_keys: result.changed_keys,
        deleted_keys: result.deleted_keys,
    }
}

/// A registry of collection id -> bound adapter, plus the dispatch logic
/// that turns a [`Request`] into a [`Response`] against whichever adapter
/// is bound. One host typically serves every collection a process knows
/// about, off one shared registry.
#[derive(Default)]
pub struct BridgeHost {
    adapters: HashMap<String, Arc<dyn BoundAdapter>>,
}

impl BridgeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, collection_id: impl Into<String>, adapter: Arc<dyn BoundAdapter>) {
        self.adapters.insert(collection_id.into(), adapter);
    }

    pub async fn handle(&self, request: Request) -> Response {
        let method_name = request.method.name().to_string();

        if let Err(protocol_err) = validate(&request) {
            return Response::err(request.request_id, method_name, protocol_err.into());
        }

        let adapter = match self.adapters.get(&request.collection_id) {
            Some(adapter) => adapter.clone(),
            None => {
                let err = BridgeError::unknown_collection(&request.collection_id);
                return Response::err(request.request_id, method_name, err.into());
            }
        };

        let policy = request
            .resolution
            .as_ref()
            .map(|r| SchemaMismatchPolicy::default_for_sync_presence(matches!(r.mode, crate::envelope::ResolutionMode::SyncPresent)))
            .unwrap_or_default();

        let outcome = dispatch(adapter.as_ref(), request.method, policy).await;
        match outcome {
            Ok(result) => Response::ok(request.request_id, method_name, result),
            Err(err) => Response::err(request.request_id, method_name, to_wire_error(err)),
        }
    }
}

fn validate(request: &Request) -> std::result::Result<(), ProtocolError> {
    if request.v != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(request.v));
    }
    if request.request_id.trim().is_empty() {
        return Err(ProtocolError::EmptyRequestId);
    }
    if request.collection_id.trim().is_empty() {
        return Err(ProtocolError::EmptyCollectionId);
    }
    Ok(())
}

async fn dispatch(
    adapter: &dyn BoundAdapter,
    method: BridgeMethod,
    policy: SchemaMismatchPolicy,
) -> tsdb_errors::Result<serde_json::Value> {
    match method {
        BridgeMethod::LoadSubset(payload) => {
            let rows = adapter.load_subset(payload.schema_version, payload.limit, policy).await?;
            let wire: Vec<WireKeyValueRow> = rows.into_iter().map(row_to_wire).collect();
            Ok(serde_json::to_value(wire)?)
        }
        BridgeMethod::ApplyCommittedTx(payload) => {
            adapter.apply_committed_tx(tx_from_wire(payload.tx)).await?;
            Ok(serde_json::Value::Null)
        }
        BridgeMethod::EnsureIndex(payload) => {
            let spec = IndexSpec { fields: payload.fields };
            adapter.ensure_index(&payload.signature, &spec).await?;
            Ok(serde_json::Value::Null)
        }
        BridgeMethod::MarkIndexRemoved(payload) => {
            adapter.mark_index_removed(&payload.signature).await?;
            Ok(serde_json::Value::Null)
        }
        BridgeMethod::PullSince(payload) => {
            let result = adapter.pull_since(payload.from_row_version).await?;
            Ok(serde_json::to_value(pull_since_to_wire(result))?)
        }
    }
}

fn to_wire_error(err: TsdbError) -> WireError {
    match err {
        TsdbError::Unsupported(inner) => BridgeError::unsupported_method(&inner.0).into(),
        TsdbError::Bridge(inner) => inner.into(),
        TsdbError::Protocol(inner) => inner.into(),
        other => WireError::remote(other.to_string()),
    }
}
