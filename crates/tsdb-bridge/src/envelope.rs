//! Wire types for the runtime bridge. A `Request`/`Response` pair is the
//! only thing that crosses the boundary; everything here is plain
//! `Serialize + Deserialize` data with no business logic attached.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tsdb_keys::StorageKey;

/// The only envelope version this crate speaks. A `Request` carrying any
/// other value is rejected before dispatch.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default Electron IPC / MessagePort channel name a transport binds to.
/// Purely a naming convention for callers that wire this crate to an actual
/// IPC channel; nothing in this crate reads or writes the constant itself.
pub const DEFAULT_CHANNEL_NAME: &str = "tanstack-db:sqlite-persistence";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    SyncAbsent,
    SyncPresent,
}

/// How the caller wants a schema mismatch resolved for this call, carried
/// alongside `loadSubset` requests so the host can pick the right
/// [`tsdb_config::SchemaMismatchPolicy`] without the caller needing to know
/// the policy enum itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub mode: ResolutionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireKeyValueRow {
    pub key: StorageKey,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireMutationKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMutation {
    pub kind: WireMutationKind,
    pub key: StorageKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCommittedTx {
    pub tx_id: String,
    pub term: i64,
    pub seq: i64,
    pub row_version: i64,
    pub mutations: Vec<WireMutation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePullSinceResult {
    pub latest_row_version: i64,
    pub requires_full_reload: bool,
    pub changed_keys: Vec<StorageKey>,
    pub deleted_keys: Vec<StorageKey>,
}

/// `loadSubset` payload, narrowed from `tsdb-persist::LoadSubsetOptions`:
/// `Predicate` has no serde impl (it is an in-process IR, never a wire
/// format) and none of this crate's named scenarios need an arbitrary
/// predicate to cross the boundary, so this carries only `schemaVersion`
/// and `limit`. A caller needing a filtered subset across the bridge should
/// widen this payload when that need arises rather than round-tripping a
/// predicate tree through JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSubsetPayload {
    pub schema_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCommittedTxPayload {
    pub tx: WireCommittedTx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureIndexPayload {
    pub signature: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkIndexRemovedPayload {
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullSincePayload {
    pub from_row_version: i64,
}

/// One of the five bridge methods, tagged by `method` with the payload
/// under `payload` so `Request` can flatten this in without a nested
/// object indirection on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload")]
pub enum BridgeMethod {
    #[serde(rename = "loadSubset")]
    LoadSubset(LoadSubsetPayload),
    #[serde(rename = "applyCommittedTx")]
    ApplyCommittedTx(ApplyCommittedTxPayload),
    #[serde(rename = "ensureIndex")]
    EnsureIndex(EnsureIndexPayload),
    #[serde(rename = "markIndexRemoved")]
    MarkIndexRemoved(MarkIndexRemovedPayload),
    #[serde(rename = "pullSince")]
    PullSince(PullSincePayload),
}

impl BridgeMethod {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeMethod::LoadSubset(_) => "loadSubset",
            BridgeMethod::ApplyCommittedTx(_) => "applyCommittedTx",
            BridgeMethod::EnsureIndex(_) => "ensureIndex",
            BridgeMethod::MarkIndexRemoved(_) => "markIndexRemoved",
            BridgeMethod::PullSince(_) => "pullSince",
        }
    }
}

/// A call crossing the bridge boundary in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub v: u32,
    pub request_id: String,
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(flatten)]
    pub method: BridgeMethod,
}

/// Wire-carried failure. `stack` is always `None` on anything this crate
/// constructs — native stack objects never leak across the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl WireError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            name: "RemoteError".to_string(),
            message: message.into(),
            code: Some(tsdb_errors::BridgeErrorCode::RemoteError.as_str().to_string()),
            stack: None,
        }
    }
}

impl From<tsdb_errors::BridgeError> for WireError {
    fn from(err: tsdb_errors::BridgeError) -> Self {
        Self {
            name: err.name,
            message: err.message,
            code: Some(err.code.as_str().to_string()),
            stack: None,
        }
    }
}

impl From<tsdb_errors::ProtocolError> for WireError {
    fn from(err: tsdb_errors::ProtocolError) -> Self {
        Self {
            name: "ElectronPersistenceProtocolError".to_string(),
            message: err.to_string(),
            code: Some(tsdb_errors::BridgeErrorCode::InvalidProtocol.as_str().to_string()),
            stack: None,
        }
    }
}

/// The reply to a [`Request`]. `ok` discriminates rather than relying on
/// serde's internally-tagged-enum string matching, since the two shapes
/// (`result` present / `error` present) differ in more than one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub v: u32,
    pub request_id: String,
    pub method: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, method: impl Into<String>, result: JsonValue) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            method: method.into(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(request_id: impl Into<String>, method: impl Into<String>, error: WireError) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            method: method.into(),
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}
