//! Feedback session records.
//!
//! A [`FeedbackSession`] tracks a single `interactive_feedback` call from the
//! moment the elicitation is issued until the human answers (or the request
//! fails). Sessions are short-lived and never persisted.
//!
//! # Status transitions
//!
//! ```text
//! waiting ──► completed
//!    │
//!    └──────► error
//! ```
//!
//! Both `completed` and `error` are terminal. The first transition into a
//! terminal status stamps `end_time`; later calls never overwrite it.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every generated session id.
pub const SESSION_ID_PREFIX: &str = "feedback";

/// Length of the random suffix appended to session ids.
const SESSION_ID_SUFFIX_LEN: usize = 9;

static SESSION_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^feedback_\d+_[a-z0-9]+$").expect("session id pattern is valid")
});

/// Lifecycle status of a feedback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Elicitation issued, waiting for the human.
    Waiting,
    /// The human responded (accept, decline, or cancel).
    Completed,
    /// Classification or the channel call failed.
    Error,
}

impl SessionStatus {
    /// Returns `true` for `Completed` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Wire name used in tool output and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value snapshot of a [`FeedbackSession`].
///
/// Returned by [`FeedbackSession::snapshot`]. Mutating a snapshot never
/// affects the session it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub project_directory: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_action: Option<String>,
    pub status: SessionStatus,
}

/// Bookkeeping for one in-flight elicitation request.
///
/// # Examples
///
/// ```
/// use feedback_mcp::session::{FeedbackSession, SessionStatus};
///
/// let mut session = FeedbackSession::new("feedback_1_abc".into(), ".".into(), "done".into());
/// assert_eq!(session.status(), SessionStatus::Waiting);
/// assert!(session.response_time().is_none());
///
/// session.set_user_feedback("looks good", "continue");
/// assert_eq!(session.status(), SessionStatus::Completed);
/// assert!(session.response_time().is_some());
/// ```
#[derive(Debug)]
pub struct FeedbackSession {
    data: SessionData,
}

impl FeedbackSession {
    /// Create a session in the `waiting` state, stamped with the current time.
    ///
    /// All inputs are accepted as-is, including empty strings.
    pub fn new(session_id: String, project_directory: String, summary: String) -> Self {
        Self {
            data: SessionData {
                session_id,
                project_directory,
                summary,
                start_time: Utc::now(),
                end_time: None,
                user_feedback: None,
                user_action: None,
                status: SessionStatus::Waiting,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.data.session_id
    }

    pub fn project_directory(&self) -> &str {
        &self.data.project_directory
    }

    pub fn summary(&self) -> &str {
        &self.data.summary
    }

    pub fn status(&self) -> SessionStatus {
        self.data.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.data.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.data.end_time
    }

    /// Owned copy of every field.
    pub fn snapshot(&self) -> SessionData {
        self.data.clone()
    }

    /// Move the session to `status`.
    ///
    /// The first terminal status stamps `end_time`. Once terminal, further
    /// transitions are ignored so the recorded outcome and `end_time` stay put.
    pub fn update_status(&mut self, status: SessionStatus) {
        if self.data.status.is_terminal() {
            if status != self.data.status {
                tracing::debug!(
                    session_id = %self.data.session_id,
                    from = %self.data.status,
                    to = %status,
                    "ignoring transition out of terminal status"
                );
            }
            return;
        }
        self.data.status = status;
        if status.is_terminal() && self.data.end_time.is_none() {
            self.data.end_time = Some(Utc::now());
        }
    }

    /// Record the human's answer and complete the session.
    ///
    /// This is the only way `user_feedback` and `user_action` are populated.
    pub fn set_user_feedback(&mut self, feedback: impl Into<String>, action: impl Into<String>) {
        self.data.user_feedback = Some(feedback.into());
        self.data.user_action = Some(action.into());
        self.update_status(SessionStatus::Completed);
    }

    /// Time between creation and the first terminal transition.
    ///
    /// `None` while the session is still waiting.
    pub fn response_time(&self) -> Option<Duration> {
        let end = self.data.end_time?;
        Some((end - self.data.start_time).to_std().unwrap_or(Duration::ZERO))
    }

    /// [`Self::response_time`] in whole milliseconds.
    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Generate a fresh session id: `feedback_<unix-millis>_<random>`.
///
/// The suffix is taken from a v4 UUID, so two ids minted in the same
/// millisecond still differ with overwhelming probability.
pub fn generate_session_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!(
        "{SESSION_ID_PREFIX}_{}_{}",
        Utc::now().timestamp_millis(),
        &uuid[..SESSION_ID_SUFFIX_LEN]
    )
}

/// Check that `id` has the shape produced by [`generate_session_id`].
pub fn is_valid_session_id(id: &str) -> bool {
    SESSION_ID_PATTERN.is_match(id)
}
