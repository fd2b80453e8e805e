//! Typed error taxonomy shared by every crate in the persisted collection
//! core. Unlike the ambient `anyhow::Error` used at CLI/HTTP boundaries
//! elsewhere, several callers here (the bridge dispatcher, the schema
//! mismatch policy, the collection wrapper's gap recovery) branch on error
//! *kind*, so each kind gets its own variant instead of being flattened.

use thiserror::Error;

/// Failures raised while validating configuration before any I/O happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("collection id must not be empty")]
    EmptyCollectionId,
    #[error("database path must not be empty")]
    EmptyDatabasePath,
    #[error("invalid pragma {0:?}: must match ^[A-Za-z0-9_= ]+$")]
    InvalidPragma(String),
    #[error("writer queue depth must be > 0")]
    InvalidQueueDepth,
    #[error("bridge timeout must be > 0ms")]
    InvalidTimeout,
}

/// Observed schema version disagrees with the requested one and the active
/// policy is `sync-absent-error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Schema version mismatch: expected {expected}, found {found}")]
pub struct SchemaMismatchError {
    pub expected: i64,
    pub found: i64,
}

/// Bridge envelope malformed or inconsistent with its request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unsupported envelope version {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("request id must not be empty")]
    EmptyRequestId,
    #[error("collection id must not be empty")]
    EmptyCollectionId,
    #[error("response request id {got:?} does not match request {expected:?}")]
    RequestIdMismatch { expected: String, got: String },
    #[error("response method {got:?} does not match request method {expected:?}")]
    MethodMismatch { expected: String, got: String },
}

/// The subset of spec-defined error codes exposed across the bridge wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeErrorCode {
    UnknownCollection,
    UnsupportedMethod,
    InvalidProtocol,
    Timeout,
    RemoteError,
    SchemaMismatch,
}

impl BridgeErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeErrorCode::UnknownCollection => "UNKNOWN_COLLECTION",
            BridgeErrorCode::UnsupportedMethod => "UNSUPPORTED_METHOD",
            BridgeErrorCode::InvalidProtocol => "INVALID_PROTOCOL",
            BridgeErrorCode::Timeout => "TIMEOUT",
            BridgeErrorCode::RemoteError => "REMOTE_ERROR",
            BridgeErrorCode::SchemaMismatch => "SCHEMA_MISMATCH",
        }
    }
}

impl std::fmt::Display for BridgeErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that crossed (or is about to cross) the runtime bridge boundary.
/// `name` mirrors the serialized `error.name` field; native stack traces are
/// never attached, so nothing process-specific leaks across the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: BridgeErrorCode,
    pub name: String,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: BridgeErrorCode, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unknown_collection(collection_id: &str) -> Self {
        Self::new(
            BridgeErrorCode::UnknownCollection,
            "UnknownCollection",
            format!("no adapter is bound to collection {collection_id:?}"),
        )
    }

    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            BridgeErrorCode::UnsupportedMethod,
            "UnsupportedMethod",
            format!("method {method:?} is not implemented by the bound adapter"),
        )
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self::new(
            BridgeErrorCode::Timeout,
            "TimeoutError",
            format!("no response received within {after_ms}ms"),
        )
    }
}

/// Driver-level failures. `Sqlite` passes the underlying error through
/// unchanged rather than wrapping it in a new message.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("nested transaction is not supported under a host-native transaction API")]
    NestedTransactionUnsupported,
    #[error("writer thread is no longer running")]
    WriterGone,
}

/// A requested operation is not implemented by the bound adapter or host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported: {0}")]
pub struct UnsupportedError(pub String);

/// The union of every failure this workspace can produce. Most call sites
/// should use [`TsdbError`] directly; the component-specific types above
/// exist so a caller that needs to distinguish one kind from another can
/// match on the sub-error instead of string-matching a display message.
#[derive(Debug, Error)]
pub enum TsdbError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),
    #[error("payload serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    /// A non-leader coordinator could not route a write to the leader. The
    /// shipped single-process coordinator never produces this — it is
    /// always leader.
    #[error("no leader available for collection {collection_id:?}")]
    NoLeader { collection_id: String },

    /// `applyCommittedTx` rejected a duplicate or stale transaction. Not
    /// itself a failure the caller needs to recover from — replays of an
    /// already-applied `(term, seq)` are expected to hit this and be
    /// treated as a no-op.
    #[error(
        "stale or duplicate transaction: term={term} seq={seq} is not newer than current \
         (term={current_term}, seq={current_seq})"
    )]
    StaleTransaction {
        term: i64,
        seq: i64,
        current_term: i64,
        current_seq: i64,
    },

    #[error("invalid persisted storage key: {0}")]
    InvalidKey(String),

    #[error("invalid persisted storage key encoding: {0:?}")]
    InvalidKeyEncoding(String),

    /// A `loadSubset` predicate referenced a field path or literal the SQL
    /// lowering can't safely or meaningfully express.
    #[error("invalid predicate field or literal: {0}")]
    InvalidPredicateField(String),
}

impl From<rusqlite::Error> for TsdbError {
    fn from(err: rusqlite::Error) -> Self {
        TsdbError::Driver(DriverError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, TsdbError>;
