//! Client-side call queue. A [`BridgeInvoker`] assigns each call a
//! monotonic `requestId`, serializes calls onto one [`BridgeTransport`] in
//! FIFO order (mirrors `tsdb-driver`'s single-writer-thread queue, minus
//! the dedicated OS thread — the transport here is already async, so a
//! single background task is enough to get the same one-at-a-time
//! ordering guarantee), and enforces [`BridgeTimeout`] per call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tsdb_config::BridgeTimeout;
use tsdb_errors::{BridgeError, ProtocolError, Result, TsdbError};

use crate::envelope::{Request, Response};

/// Abstracts the actual channel a [`BridgeInvoker`] sends requests over
/// (Electron IPC, a MessagePort, or — in tests — a direct call into a
/// [`crate::host::BridgeHost`]).
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

struct QueuedCall {
    request: Request,
    reply: oneshot::Sender<Result<Response>>,
}

/// Queues calls onto a bound [`BridgeTransport`], one at a time, and
/// validates that each reply actually answers the request that produced
/// it (matching `requestId` and `method`) before handing it back.
pub struct BridgeInvoker {
    next_id: AtomicU64,
    timeout: BridgeTimeout,
    queue: mpsc::UnboundedSender<QueuedCall>,
}

impl BridgeInvoker {
    pub fn new(transport: Arc<dyn BridgeTransport>) -> Self {
        Self::with_timeout(transport, BridgeTimeout::default())
    }

    pub fn with_timeout(transport: Arc<dyn BridgeTransport>, timeout: BridgeTimeout) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(transport, rx, timeout));
        Self {
            next_id: AtomicU64::new(1),
            timeout,
            queue: tx,
        }
    }

    fn next_request_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("electron-persistence-{n}")
    }

    pub fn timeout(&self) -> BridgeTimeout {
        self.timeout
    }

    /// Send `method` against `collection_id`, filling in `v` and
    /// `requestId`. Calls queue and drain strictly in submission order.
    pub async fn invoke(
        &self,
        collection_id: impl Into<String>,
        resolution: Option<crate::envelope::Resolution>,
        method: crate::envelope::BridgeMethod,
    ) -> Result<Response> {
        let request_id = self.next_request_id();
        let expected_method = method.name().to_string();
        let request = Request {
            v: crate::envelope::PROTOCOL_VERSION,
            request_id: request_id.clone(),
            collection_id: collection_id.into(),
            resolution,
            method,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(QueuedCall { request, reply: reply_tx })
            .map_err(|_| TsdbError::from(BridgeError::new(
                tsdb_errors::BridgeErrorCode::RemoteError,
                "InvokerClosed",
                "bridge invoker's drain task is no longer running",
            )))?;

        let response = reply_rx
            .await
            .map_err(|_| TsdbError::from(BridgeError::new(
                tsdb_errors::BridgeErrorCode::RemoteError,
                "InvokerClosed",
                "bridge invoker's drain task dropped the reply channel",
            )))??;

        if response.request_id != request_id {
            return Err(TsdbError::from(ProtocolError::RequestIdMismatch {
                expected: request_id,
                got: response.request_id,
            }));
        }
        if response.method != expected_method {
            return Err(TsdbError::from(ProtocolError::MethodMismatch {
                expected: expected_method,
                got: response.method,
            }));
        }
        Ok(response)
    }
}

async fn drain(transport: Arc<dyn BridgeTransport>, mut rx: mpsc::UnboundedReceiver<QueuedCall>, timeout: BridgeTimeout) {
    while let Some(call) = rx.recv().await {
        let result = match tokio::time::timeout(Duration::from_millis(timeout.millis()), transport.send(call.request)).await {
            Ok(result) => result,
            Err(_) => Err(TsdbError::from(BridgeError::timeout(timeout.millis()))),
        };
        let _ = call.reply.send(result);
    }
}
