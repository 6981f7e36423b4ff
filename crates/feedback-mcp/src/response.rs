//! Classification of elicitation results.
//!
//! [`classify`] turns the client's [`ElicitResult`] into a [`FeedbackResult`]
//! and records the outcome on the [`FeedbackSession`]. The open `action`
//! string is first validated into the closed [`ElicitationOutcome`]; anything
//! that fails validation (an unknown action or a malformed payload) is
//! recovered here and reported as an `error` result. Classification never
//! fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::channel::ElicitResult;
use crate::schema::FEEDBACK_FIELD;
use crate::session::{FeedbackSession, SessionStatus};

/// Characters of feedback echoed into [`FeedbackResult::message`].
pub const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Action recorded on the session for accepted feedback.
pub const ACTION_CONTINUE: &str = "continue";
pub const ACTION_DECLINED: &str = "declined";
pub const ACTION_CANCELLED: &str = "cancelled";
pub const ACTION_ERROR: &str = "error";

const ACCEPT_MESSAGE_PREFIX: &str = "Feedback collection complete. Feedback: ";
const DECLINE_MESSAGE: &str = "User declined to provide feedback.";
const DECLINE_ERROR: &str = "User declined to provide feedback";
const CANCEL_MESSAGE: &str = "User cancelled the feedback operation.";
const CANCEL_ERROR: &str = "User cancelled the feedback operation";
const ERROR_MESSAGE: &str = "An error occurred while processing user feedback.";

/// Closed set of ways a human can resolve an elicitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElicitationOutcome {
    Accept { feedback: String },
    Decline,
    Cancel,
}

/// Why an [`ElicitResult`] could not be turned into an [`ElicitationOutcome`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("Unknown elicitation response action: {0}")]
    UnknownAction(String),
    #[error("Malformed elicitation content: expected an object, got {0}")]
    ContentNotObject(&'static str),
    #[error("Malformed elicitation content: `feedback` must be a string, got {0}")]
    FeedbackNotString(&'static str),
}

impl TryFrom<&ElicitResult> for ElicitationOutcome {
    type Error = OutcomeError;

    fn try_from(result: &ElicitResult) -> Result<Self, Self::Error> {
        match result.action.as_str() {
            "accept" => Ok(Self::Accept {
                feedback: extract_feedback(result.content.as_ref())?,
            }),
            "decline" => Ok(Self::Decline),
            "cancel" => Ok(Self::Cancel),
            other => Err(OutcomeError::UnknownAction(other.to_string())),
        }
    }
}

/// Pull the `feedback` string out of an accept payload.
///
/// Missing payloads, missing fields, and `null` all mean "no feedback".
fn extract_feedback(content: Option<&Value>) -> Result<String, OutcomeError> {
    let obj = match content {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Object(obj)) => obj,
        Some(other) => return Err(OutcomeError::ContentNotObject(json_kind(other))),
    };
    match obj.get(FEEDBACK_FIELD) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(OutcomeError::FeedbackNotString(json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Session details embedded in every [`FeedbackResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub project_directory: String,
    pub response_time_ms: Option<u64>,
    pub status: SessionStatus,
}

impl SessionInfo {
    fn from_session(session: &FeedbackSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            project_directory: session.project_directory().to_string(),
            response_time_ms: session.response_time_ms(),
            status: session.status(),
        }
    }
}

/// Normalized outcome of one feedback request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub success: bool,
    pub feedback: String,
    pub action: String,
    pub session_info: SessionInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Classify `result` and update `session` accordingly.
///
/// | action  | session           | success | action      |
/// |---------|-------------------|---------|-------------|
/// | accept  | feedback recorded | true    | `continue`  |
/// | decline | completed         | false   | `declined`  |
/// | cancel  | completed         | false   | `cancelled` |
/// | other   | error             | false   | `error`     |
pub fn classify(result: &ElicitResult, session: &mut FeedbackSession) -> FeedbackResult {
    match ElicitationOutcome::try_from(result) {
        Ok(outcome) => apply_outcome(outcome, session),
        Err(err) => {
            tracing::warn!(session_id = %session.id(), error = %err, "elicitation result rejected");
            session.update_status(SessionStatus::Error);
            FeedbackResult {
                success: false,
                feedback: String::new(),
                action: ACTION_ERROR.to_string(),
                session_info: SessionInfo::from_session(session),
                message: Some(ERROR_MESSAGE.to_string()),
                error: Some(err.to_string()),
            }
        }
    }
}

fn apply_outcome(outcome: ElicitationOutcome, session: &mut FeedbackSession) -> FeedbackResult {
    match outcome {
        ElicitationOutcome::Accept { feedback } => {
            session.set_user_feedback(feedback.as_str(), ACTION_CONTINUE);
            let message = format!("{ACCEPT_MESSAGE_PREFIX}{}", truncate_chars(&feedback, MESSAGE_PREVIEW_CHARS));
            FeedbackResult {
                success: true,
                feedback,
                action: ACTION_CONTINUE.to_string(),
                session_info: SessionInfo::from_session(session),
                message: Some(message),
                error: None,
            }
        }
        ElicitationOutcome::Decline => {
            session.update_status(SessionStatus::Completed);
            rejected(session, ACTION_DECLINED, DECLINE_MESSAGE, DECLINE_ERROR)
        }
        ElicitationOutcome::Cancel => {
            session.update_status(SessionStatus::Completed);
            rejected(session, ACTION_CANCELLED, CANCEL_MESSAGE, CANCEL_ERROR)
        }
    }
}

fn rejected(session: &FeedbackSession, action: &str, message: &str, error: &str) -> FeedbackResult {
    FeedbackResult {
        success: false,
        feedback: String::new(),
        action: action.to_string(),
        session_info: SessionInfo::from_session(session),
        message: Some(message.to_string()),
        error: Some(error.to_string()),
    }
}

/// Keep the first `max` characters of `text`, appending `...` when anything
/// was cut. Counts `char`s, so multi-byte text is never split mid-character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_session() -> FeedbackSession {
        FeedbackSession::new(
            "test-session".to_string(),
            "/test/project".to_string(),
            "Test summary".to_string(),
        )
    }

    #[test]
    fn accept_with_feedback() {
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"feedback": "Great!"})), &mut session);

        assert!(result.success);
        assert_eq!(result.feedback, "Great!");
        assert_eq!(result.action, "continue");
        assert!(result.error.is_none());
        assert_eq!(result.session_info.session_id, "test-session");
        assert_eq!(result.session_info.project_directory, "/test/project");
        assert_eq!(result.session_info.status, SessionStatus::Completed);
        assert!(result.session_info.response_time_ms.is_some());
        assert!(result.message.unwrap().contains("Feedback collection complete"));

        let data = session.snapshot();
        assert_eq!(data.status, SessionStatus::Completed);
        assert_eq!(data.user_feedback.as_deref(), Some("Great!"));
        assert_eq!(data.user_action.as_deref(), Some("continue"));
    }

    #[test]
    fn accept_with_empty_feedback() {
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"feedback": ""})), &mut session);
        assert!(result.success);
        assert_eq!(result.feedback, "");
        assert_eq!(result.action, "continue");
    }

    #[test]
    fn accept_without_content() {
        let mut session = make_session();
        let result = classify(&ElicitResult::bare("accept"), &mut session);
        assert!(result.success);
        assert_eq!(result.feedback, "");
        assert_eq!(session.snapshot().user_feedback.as_deref(), Some(""));
    }

    #[test]
    fn accept_with_content_missing_feedback_field() {
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"other": 1})), &mut session);
        assert!(result.success);
        assert_eq!(result.feedback, "");
    }

    #[test]
    fn decline() {
        let mut session = make_session();
        let result = classify(&ElicitResult::decline(), &mut session);
        assert!(!result.success);
        assert_eq!(result.feedback, "");
        assert_eq!(result.action, "declined");
        assert_eq!(result.session_info.status, SessionStatus::Completed);
        assert_eq!(result.message.as_deref(), Some("User declined to provide feedback."));
        assert_eq!(result.error.as_deref(), Some("User declined to provide feedback"));
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(session.snapshot().user_feedback.is_none());
    }

    #[test]
    fn cancel() {
        let mut session = make_session();
        let result = classify(&ElicitResult::cancel(), &mut session);
        assert!(!result.success);
        assert_eq!(result.action, "cancelled");
        assert_eq!(result.session_info.status, SessionStatus::Completed);
        assert_eq!(result.message.as_deref(), Some("User cancelled the feedback operation."));
        assert_eq!(result.error.as_deref(), Some("User cancelled the feedback operation"));
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn unknown_action_is_recovered_as_error() {
        let mut session = make_session();
        let result = classify(&ElicitResult::bare("bogus"), &mut session);
        assert!(!result.success);
        assert_eq!(result.feedback, "");
        assert_eq!(result.action, "error");
        assert_eq!(result.session_info.status, SessionStatus::Error);
        assert_eq!(
            result.message.as_deref(),
            Some("An error occurred while processing user feedback.")
        );
        let error = result.error.unwrap();
        assert!(error.contains("bogus"));
        assert_eq!(error, "Unknown elicitation response action: bogus");
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(result.session_info.response_time_ms.is_some());
    }

    #[test]
    fn malformed_content_is_recovered_as_error() {
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!("just a string")), &mut session);
        assert!(!result.success);
        assert_eq!(result.action, "error");
        assert!(result.error.unwrap().contains("expected an object"));
        assert_eq!(session.status(), SessionStatus::Error);
    }

    #[test]
    fn non_string_feedback_is_recovered_as_error() {
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"feedback": 42})), &mut session);
        assert!(!result.success);
        assert_eq!(result.action, "error");
        assert!(result.error.unwrap().contains("number"));
    }

    #[test]
    fn long_feedback_is_truncated_in_message_only() {
        let long = "A".repeat(200);
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"feedback": long})), &mut session);

        assert_eq!(result.feedback.len(), 200);
        let message = result.message.unwrap();
        let expected_tail = format!("{}...", "A".repeat(100));
        assert!(message.ends_with(&expected_tail));
        assert_eq!(message.matches('A').count(), 100);
    }

    #[test]
    fn feedback_at_limit_is_not_truncated() {
        let exact = "B".repeat(100);
        let mut session = make_session();
        let result = classify(&ElicitResult::accept(json!({"feedback": exact})), &mut session);
        assert!(!result.message.unwrap().ends_with("..."));
    }

    #[tokio::test]
    async fn response_time_reflects_wait() {
        let mut session = make_session();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let result = classify(&ElicitResult::accept(json!({"feedback": "Test"})), &mut session);
        assert!(result.session_info.response_time_ms.unwrap() >= 10);
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("短文本", 100), "短文本");
        assert_eq!(truncate_chars("反馈内容很长", 2), "反馈...");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abcd", 3), "abc...");
    }

    #[test]
    fn outcome_try_from_closed_set() {
        assert_eq!(
            ElicitationOutcome::try_from(&ElicitResult::decline()),
            Ok(ElicitationOutcome::Decline)
        );
        assert_eq!(
            ElicitationOutcome::try_from(&ElicitResult::bare("ACCEPT")),
            Err(OutcomeError::UnknownAction("ACCEPT".to_string()))
        );
    }

    #[test]
    fn result_serializes_snake_case_session_info() {
        let mut session = make_session();
        let result = classify(&ElicitResult::decline(), &mut session);
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["session_info"]["status"], "completed");
        assert_eq!(v["session_info"]["project_directory"], "/test/project");
        assert_eq!(v["action"], "declined");
    }
}
