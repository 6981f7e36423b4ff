//! MCP stdio server core.
//!
//! [`FeedbackServer`] speaks MCP JSON-RPC with a single client over a pair of
//! async streams (stdin/stdout in production). It:
//!
//! - Auto-detects Content-Length vs newline-delimited framing per message and
//!   answers in the framing last used by the client
//! - Answers `initialize`, `ping`, `tools/list` and `tools/call`
//! - Runs every `interactive_feedback` call in its own task so the read loop
//!   keeps routing client responses to in-flight `elicitation/create` requests
//! - Sweeps stale session records on a heartbeat
//! - On client EOF, releases every session and fails every pending elicitation

use std::io;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use crate::config::FeedbackConfig;
use crate::elicitation::{PeerChannel, PendingElicitations};
use crate::framing::{FramingMode, MessageReader, write_message};
use crate::orchestrator::{FeedbackOrchestrator, FeedbackParams};
use crate::tools::{TOOL_NAME, tools_list_result};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "mcp-feedback-elicitation";

/// Protocol version offered when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// Channel buffer capacity for outbound messages.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for in-flight tool calls to queue their responses.
const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// JSON-RPC error code: invalid JSON.
pub const ERR_PARSE: i64 = -32700;

/// JSON-RPC error code: not a valid request object.
pub const ERR_INVALID_REQUEST: i64 = -32600;

/// JSON-RPC error code: method not found.
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC error code: invalid params (including unknown tool names).
pub const ERR_INVALID_PARAMS: i64 = -32602;

/// JSON-RPC error code: internal error.
pub const ERR_INTERNAL: i64 = -32603;

/// The `interactive_feedback` MCP server.
#[derive(Debug)]
pub struct FeedbackServer {
    config: FeedbackConfig,
}

impl FeedbackServer {
    pub fn new(config: FeedbackConfig) -> Self {
        Self { config }
    }

    /// Serve one client until `input` reaches EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails. Failures of individual
    /// feedback requests are reported to the client, not returned here.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send,
    {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(OUTBOUND_CHANNEL_CAPACITY);
        let conn = Connection::new(&self.config, outbound_tx);

        // The reader lives in its own task: `next_message` is not cancel-safe,
        // so it must never be a losing `select!` branch.
        let (inbound_tx, mut inbound_rx) =
            mpsc::channel::<io::Result<(String, FramingMode)>>(OUTBOUND_CHANNEL_CAPACITY);
        let reader_task = tokio::spawn(async move {
            let mut reader = MessageReader::new(input);
            loop {
                match reader.next_message().await {
                    Ok(Some(raw)) => {
                        if inbound_tx.send(Ok((raw, reader.mode()))).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = inbound_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let max_age = self.config.session_max_age();
        let mut mode = FramingMode::default();
        let mut read_error = None;

        tracing::info!(server = SERVER_NAME, version = env!("CARGO_PKG_VERSION"), "server started");

        loop {
            tokio::select! {
                inbound = inbound_rx.recv() => match inbound {
                    Some(Ok((raw, framing))) => {
                        mode = framing;
                        conn.handle_message(&raw).await;
                    }
                    Some(Err(e)) => {
                        tracing::error!("failed to read client message: {e}");
                        read_error = Some(e);
                        break;
                    }
                    None => {
                        tracing::info!("client EOF, shutting down");
                        break;
                    }
                },

                Some(msg) = outbound_rx.recv() => {
                    let serialized = serde_json::to_string(&msg).unwrap_or_default();
                    if let Err(e) = write_message(&mut output, mode, &serialized).await {
                        tracing::warn!("failed to write to client: {e}");
                        break;
                    }
                }

                _ = heartbeat.tick() => {
                    let sessions = conn.orchestrator.sessions();
                    let expired = sessions.sweep_expired(max_age);
                    if !expired.is_empty() {
                        tracing::warn!(count = expired.len(), "removed expired feedback sessions");
                    }
                    tracing::debug!(active = sessions.len(), "heartbeat");
                }
            }
        }

        reader_task.abort();
        conn.shutdown().await;

        // In-flight calls have finished (or the grace period ran out); flush
        // their responses.
        while let Ok(msg) = outbound_rx.try_recv() {
            let serialized = serde_json::to_string(&msg).unwrap_or_default();
            if write_message(&mut output, mode, &serialized).await.is_err() {
                break;
            }
        }

        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Per-client dispatch state.
struct Connection {
    orchestrator: Arc<FeedbackOrchestrator>,
    channel: PeerChannel,
    pending: Arc<Mutex<PendingElicitations>>,
    outbound: mpsc::Sender<Value>,
    tool_description: String,
    /// Tool-call tasks that may still queue a response.
    calls: StdMutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    fn new(config: &FeedbackConfig, outbound: mpsc::Sender<Value>) -> Self {
        let pending = Arc::new(Mutex::new(PendingElicitations::new()));
        let channel = PeerChannel::new(outbound.clone(), Arc::clone(&pending));
        let orchestrator = Arc::new(FeedbackOrchestrator::new(
            Arc::new(channel.clone()),
            config,
        ));
        Self {
            orchestrator,
            channel,
            pending,
            outbound,
            tool_description: config.tool_description().to_string(),
            calls: StdMutex::new(Vec::new()),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
        calls.retain(|h| !h.is_finished());
        calls.push(handle);
    }

    async fn send(&self, msg: Value) {
        if self.outbound.send(msg).await.is_err() {
            tracing::debug!("outbound channel closed, dropping message");
        }
    }

    async fn handle_message(&self, raw: &str) {
        let msg: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("failed to parse client JSON: {e}");
                self.send(make_error_response(Value::Null, ERR_PARSE, "Parse error", Value::Null))
                    .await;
                return;
            }
        };

        tracing::debug!(direction = "client->server", %msg);

        let id = msg.get("id").cloned();
        let Some(method) = msg.get("method").and_then(Value::as_str) else {
            match id {
                Some(id) if msg.get("result").is_some() || msg.get("error").is_some() => {
                    if !self.pending.lock().await.resolve(&id, msg.clone()) {
                        tracing::debug!(%id, "response for unknown or expired elicitation");
                    }
                }
                _ => {
                    self.send(make_error_response(
                        id.unwrap_or(Value::Null),
                        ERR_INVALID_REQUEST,
                        "Invalid Request",
                        Value::Null,
                    ))
                    .await;
                }
            }
            return;
        };

        if method.starts_with("notifications/") {
            tracing::debug!(method, "notification");
            return;
        }

        let Some(id) = id else {
            tracing::debug!(method, "ignoring unknown notification");
            return;
        };

        let params = msg.get("params");
        let reply = match method {
            "initialize" => make_result_response(id, self.initialize(params)),
            "ping" => make_result_response(id, json!({})),
            "tools/list" => make_result_response(id, tools_list_result(&self.tool_description)),
            "tools/call" => {
                self.tools_call(id, params);
                return;
            }
            other => make_error_response(
                id,
                ERR_METHOD_NOT_FOUND,
                &format!("Method not found: {other}"),
                Value::Null,
            ),
        };
        self.send(reply).await;
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let supports = params
            .and_then(|p| p.get("capabilities"))
            .and_then(|c| c.get("elicitation"))
            .is_some_and(|e| !e.is_null());
        self.channel.set_client_supports_elicitation(supports);

        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if supports {
            tracing::info!(client, "client initialized");
        } else {
            tracing::warn!(client, "client does not advertise elicitation; feedback requests will fail");
        }

        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    /// Start an `interactive_feedback` call; the response is queued when it finishes.
    fn tools_call(&self, id: Value, params: Option<&Value>) {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if name != TOOL_NAME {
            let err = make_error_response(
                id,
                ERR_INVALID_PARAMS,
                &format!("Unknown tool: {name}"),
                Value::Null,
            );
            let outbound = self.outbound.clone();
            self.track(tokio::spawn(async move {
                let _ = outbound.send(err).await;
            }));
            return;
        }

        let arguments = params.and_then(|p| p.get("arguments")).cloned();
        let orchestrator = Arc::clone(&self.orchestrator);
        let outbound = self.outbound.clone();

        self.track(tokio::spawn(async move {
            let params = FeedbackParams::from_arguments(arguments.as_ref());
            // Inner task so a panic still produces a response.
            let call = tokio::spawn(async move { orchestrator.handle_feedback_request(params).await });
            let response = match call.await {
                Ok(output) => make_result_response(id, output.to_call_result()),
                Err(e) => {
                    tracing::error!("feedback task failed: {e}");
                    make_error_response(
                        id,
                        ERR_INTERNAL,
                        "Internal error while collecting feedback",
                        Value::Null,
                    )
                }
            };
            let _ = outbound.send(response).await;
        }));
    }

    /// Release every session, wake every parked elicitation, and wait for the
    /// woken tool calls to queue their responses.
    async fn shutdown(&self) {
        let sessions = self.orchestrator.sessions().clear();
        let pending = self.pending.lock().await.fail_all();
        let calls = std::mem::take(&mut *self.calls.lock().unwrap_or_else(|p| p.into_inner()));
        let in_flight = calls.len();

        let drained = tokio::time::timeout(SHUTDOWN_DRAIN_GRACE, async {
            for call in calls {
                let _ = call.await;
            }
        })
        .await
        .is_ok();
        if !drained {
            tracing::warn!(in_flight, "tool calls still running after shutdown grace period");
        }
        tracing::info!(sessions, pending, in_flight, "connection closed");
    }
}

/// Construct a JSON-RPC success response.
pub fn make_result_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

/// Construct a JSON-RPC error response. `data` is omitted when null.
pub fn make_error_response(id: Value, code: i64, message: &str, data: Value) -> Value {
    let mut error = json!({
        "code": code,
        "message": message
    });
    if !data.is_null() {
        error["data"] = data;
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}
