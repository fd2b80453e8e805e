//! Runtime bridge (C6): the JSON envelope, host-side dispatcher, and
//! client-side invoker for the request/response protocol that crosses an
//! IPC boundary. Everything that crosses the boundary is plain serde data
//! (`envelope`); everything that decides what to do with it stays
//! in-process (`adapter`, `host`, `invoker`).

mod adapter;
mod envelope;
mod host;
mod invoker;

#[cfg(feature = "http")]
mod route;

pub use adapter::{BoundAdapter, SqliteAdapter};
pub use envelope::{
    ApplyCommittedTxPayload, BridgeMethod, EnsureIndexPayload, LoadSubsetPayload, MarkIndexRemovedPayload,
    PullSincePayload, Request, Resolution, ResolutionMode, Response, WireCommittedTx, WireError, WireKeyValueRow,
    WireMutation, WireMutationKind, WirePullSinceResult, DEFAULT_CHANNEL_NAME, PROTOCOL_VERSION,
};
pub use host::BridgeHost;
pub use invoker::{BridgeInvoker, BridgeTransport};

#[cfg(feature = "http")]
pub use route::build_router;
