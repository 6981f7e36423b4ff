//! Server-initiated `elicitation/create` requests over the client connection.
//!
//! [`PeerChannel`] is the production [`ElicitationChannel`]: it queues an
//! `elicitation/create` JSON-RPC request on the server's outbound channel and
//! parks on a oneshot until the client's response is routed back by
//! [`crate::server::FeedbackServer`].
//!
//! [`PendingElicitations`] maps outbound request ids to the waiting oneshot
//! senders so that responses read from the client can be correlated back to
//! the right feedback request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::channel::{
    ChannelError, ElicitRequest, ElicitResult, ElicitationChannel, duration_millis,
};

/// JSON-RPC method for server-initiated elicitation.
pub const ELICITATION_METHOD: &str = "elicitation/create";

/// A single elicitation waiting for the client's response.
pub struct PendingElicitation {
    /// Outbound request id (also the map key, stringified).
    pub request_id: Value,
    /// When the request was sent.
    pub created_at: Instant,
    /// Delivers the raw JSON-RPC response back to [`PeerChannel::elicit`].
    pub response_tx: oneshot::Sender<Value>,
}

impl std::fmt::Debug for PendingElicitation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingElicitation")
            .field("request_id", &self.request_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Registry of outstanding elicitations keyed by `request_id.to_string()`.
///
/// Wrap in `Arc<tokio::sync::Mutex<PendingElicitations>>` when sharing across
/// async tasks.
///
/// # Examples
///
/// ```
/// use feedback_mcp::elicitation::PendingElicitations;
/// use tokio::sync::oneshot;
///
/// let mut pending = PendingElicitations::new();
/// let (tx, _rx) = oneshot::channel();
/// pending.register(serde_json::json!(1), tx);
/// assert!(pending.resolve(&serde_json::json!(1), serde_json::json!({"result": {}})));
/// ```
#[derive(Debug, Default)]
pub struct PendingElicitations {
    pending: HashMap<String, PendingElicitation>,
}

impl PendingElicitations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a request until its response arrives.
    pub fn register(&mut self, request_id: Value, response_tx: oneshot::Sender<Value>) {
        let key = request_id.to_string();
        self.pending.insert(
            key,
            PendingElicitation {
                request_id,
                created_at: Instant::now(),
                response_tx,
            },
        );
    }

    /// Deliver `response` to the waiter registered under `request_id`.
    ///
    /// Returns `true` if an entry was found. The entry is removed either way.
    pub fn resolve(&mut self, request_id: &Value, response: Value) -> bool {
        match self.pending.remove(&request_id.to_string()) {
            Some(entry) => {
                // The waiter may have timed out and gone away; nothing to do then.
                let _ = entry.response_tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Forget a request without answering it.
    pub fn remove(&mut self, request_id: &Value) -> bool {
        self.pending.remove(&request_id.to_string()).is_some()
    }

    /// Drop every waiter so each one observes a closed channel.
    ///
    /// Called when the client connection ends. Returns how many were dropped.
    pub fn fail_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// [`ElicitationChannel`] backed by the MCP client on the other end of stdio.
#[derive(Debug, Clone)]
pub struct PeerChannel {
    outbound: mpsc::Sender<Value>,
    pending: Arc<Mutex<PendingElicitations>>,
    next_id: Arc<AtomicU64>,
    client_supports_elicitation: Arc<AtomicBool>,
}

impl PeerChannel {
    /// Create a channel that writes requests to `outbound` and correlates
    /// responses through `pending`.
    pub fn new(outbound: mpsc::Sender<Value>, pending: Arc<Mutex<PendingElicitations>>) -> Self {
        Self {
            outbound,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            client_supports_elicitation: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record whether the client advertised the `elicitation` capability.
    ///
    /// Until `initialize` has been seen the client is assumed capable.
    pub fn set_client_supports_elicitation(&self, supported: bool) {
        self.client_supports_elicitation
            .store(supported, Ordering::Relaxed);
    }

    pub fn client_supports_elicitation(&self) -> bool {
        self.client_supports_elicitation.load(Ordering::Relaxed)
    }

    fn next_request_id(&self) -> Value {
        json!(format!("elicit-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn send_cancelled(&self, request_id: &Value, reason: &str) {
        let cancel = json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": { "requestId": request_id, "reason": reason }
        });
        // Best effort: the connection may already be gone.
        let _ = self.outbound.send(cancel).await;
    }
}

#[async_trait]
impl ElicitationChannel for PeerChannel {
    async fn elicit(
        &self,
        request: ElicitRequest,
        timeout: Duration,
    ) -> Result<ElicitResult, ChannelError> {
        if !self.client_supports_elicitation() {
            return Err(ChannelError::Unsupported);
        }

        let params = serde_json::to_value(&request)
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        let request_id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.register(request_id.clone(), tx);

        let msg = json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": ELICITATION_METHOD,
            "params": params
        });
        if self.outbound.send(msg).await.is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(ChannelError::Send("client connection closed".to_string()));
        }
        tracing::debug!(%request_id, "elicitation request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => parse_response(response),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&request_id);
                let timeout_ms = duration_millis(timeout);
                tracing::warn!(%request_id, timeout_ms, "elicitation timed out");
                self.send_cancelled(&request_id, "elicitation timed out").await;
                Err(ChannelError::Timeout { timeout_ms })
            }
        }
    }
}

/// Decode a JSON-RPC response to `elicitation/create`.
fn parse_response(response: Value) -> Result<ElicitResult, ChannelError> {
    if let Some(err) = response.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ChannelError::Rpc { code, message });
    }
    let result = response
        .get("result")
        .ok_or_else(|| ChannelError::InvalidResponse("missing `result`".to_string()))?;
    Ok(lenient_result(result))
}

/// Read an `ElicitResult` without rejecting odd shapes.
///
/// A missing or non-string `action` is carried as text so the classifier
/// reports it as an unknown action instead of it becoming a transport fault.
fn lenient_result(result: &Value) -> ElicitResult {
    let action = match result.get("action") {
        Some(Value::String(action)) => action.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    ElicitResult {
        action,
        content: result.get("content").cloned(),
    }
}
