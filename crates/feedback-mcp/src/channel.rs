//! Elicitation channel abstraction.
//!
//! [`ElicitationChannel`] is the seam between
//! [`crate::orchestrator::FeedbackOrchestrator`] and whatever carries the
//! `elicitation/create` exchange to the human. The shipping implementation is
//! [`crate::elicitation::PeerChannel`], which talks to the MCP client over the
//! server's stdio connection. [`MockChannel`] is an in-memory double used by
//! the test suites.
//!
//! The trait is object-safe via [`async_trait`], so the orchestrator stores an
//! `Arc<dyn ElicitationChannel>`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::ElicitationSchema;

/// MCP `RequestTimeout` error code, reported by clients and SDKs that time
/// out an elicitation on their side.
pub const MCP_REQUEST_TIMEOUT: i64 = -32001;

/// Marker text used by MCP SDKs for request timeouts.
const REQUEST_TIMED_OUT: &str = "Request timed out";

/// Parameters of an `elicitation/create` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitRequest {
    pub message: String,
    pub requested_schema: ElicitationSchema,
}

/// Result of an `elicitation/create` request as returned by the client.
///
/// `action` is kept as an open string: clients may send values outside
/// `accept`/`decline`/`cancel`, and those must reach the classifier so it can
/// report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitResult {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ElicitResult {
    pub fn accept(content: Value) -> Self {
        Self {
            action: "accept".to_string(),
            content: Some(content),
        }
    }

    pub fn decline() -> Self {
        Self::bare("decline")
    }

    pub fn cancel() -> Self {
        Self::bare("cancel")
    }

    /// A result with the given action and no content.
    pub fn bare(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            content: None,
        }
    }
}

/// Failure of the channel call itself (as opposed to a human's decline).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// No response arrived within the allotted window.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The client answered with a JSON-RPC error.
    #[error("{message}")]
    Rpc { code: i64, message: String },
    /// The client did not advertise the `elicitation` capability.
    #[error("Client does not support elicitation")]
    Unsupported,
    /// The request could not be written to the client.
    #[error("failed to send elicitation request: {0}")]
    Send(String),
    /// The connection closed before a response arrived.
    #[error("connection closed before the elicitation completed")]
    Disconnected,
    /// The client's response could not be decoded.
    #[error("invalid elicitation response: {0}")]
    InvalidResponse(String),
}

impl ChannelError {
    /// Whether this failure means the human simply has not answered yet.
    ///
    /// Covers our own timeout and client-side request timeouts reported as
    /// JSON-RPC errors.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Rpc { code, message } => {
                *code == MCP_REQUEST_TIMEOUT || message.contains(REQUEST_TIMED_OUT)
            }
            _ => false,
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Request/response primitive used to solicit input from the human.
#[async_trait]
pub trait ElicitationChannel: Send + Sync + std::fmt::Debug {
    /// Send `request` and wait up to `timeout` for the human's answer.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Timeout`] when no answer arrives in time, and
    /// another variant for transport or protocol failures.
    async fn elicit(
        &self,
        request: ElicitRequest,
        timeout: Duration,
    ) -> Result<ElicitResult, ChannelError>;
}

/// Scripted in-memory channel.
///
/// Replies are consumed in FIFO order; when the script runs dry every call
/// fails with [`ChannelError::Disconnected`]. All requests are recorded so
/// tests can inspect what was sent.
///
/// # Examples
///
/// ```
/// use feedback_mcp::channel::{ElicitResult, MockChannel};
///
/// let channel = MockChannel::new();
/// channel.push_ok(ElicitResult::decline());
/// assert_eq!(channel.remaining(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    replies: Arc<Mutex<VecDeque<Result<ElicitResult, ChannelError>>>>,
    requests: Arc<Mutex<Vec<(ElicitRequest, Duration)>>>,
    delay: Option<Duration>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, result: ElicitResult) {
        self.push(Ok(result));
    }

    pub fn push_err(&self, err: ChannelError) {
        self.push(Err(err));
    }

    pub fn push(&self, reply: Result<ElicitResult, ChannelError>) {
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(reply);
    }

    /// Requests received so far, with the timeout each was issued with.
    pub fn requests(&self) -> Vec<(ElicitRequest, Duration)> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Number of scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl ElicitationChannel for MockChannel {
    async fn elicit(
        &self,
        request: ElicitRequest,
        timeout: Duration,
    ) -> Result<ElicitResult, ChannelError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((request, timeout));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or(Err(ChannelError::Disconnected))
    }
}
