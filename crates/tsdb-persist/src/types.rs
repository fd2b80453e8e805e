use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tsdb_config::SchemaMismatchPolicy;
use tsdb_keys::StorageKey;

use crate::predicate::Predicate;

/// Sort direction and field for `loadSubset`'s `orderBy`. Lowered through
/// the same field-path validation as predicates (`key`/`rowVersion` map to
/// columns, everything else to `json_extract`).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadSubsetOptions {
    pub where_clause: Option<Predicate>,
    pub limit: Option<u64>,
    pub order_by: Option<OrderBy>,
    /// Schema version the caller expects this collection to be at. Always
    /// required: `loadSubset` is the one operation that enforces the
    /// schema-mismatch policy.
    pub schema_version: i64,
    pub policy: SchemaMismatchPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueRow {
    pub key: StorageKey,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub key: StorageKey,
    /// Present for insert/update, absent for delete.
    pub value: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedTx {
    pub tx_id: String,
    pub term: i64,
    pub seq: i64,
    pub row_version: i64,
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullSinceResult {
    pub latest_row_version: i64,
    pub requires_full_reload: bool,
    pub changed_keys: Vec<StorageKey>,
    pub deleted_keys: Vec<StorageKey>,
}

/// Point-in-time metadata snapshot for a collection, returned by
/// [`crate::collection_status`]. Exists so a caller (the persisted-
/// collection wrapper) can seed its own `(term, seq)` gap-detection
/// watermark from the adapter's source-of-truth values at hydration time,
/// without re-deriving them by replaying rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStatus {
    pub schema_version: i64,
    pub term: i64,
    pub last_seq: i64,
    pub last_row_version: i64,
}

/// A secondary index over one or more field paths, in the same surface as
/// predicate field paths. The caller (C5) computes `signature` as a stable
/// hash of this spec; the adapter never recomputes it, only stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<String>,
}
