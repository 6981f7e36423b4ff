//! The `interactive_feedback` flow.
//!
//! [`FeedbackOrchestrator::handle_feedback_request`] runs one feedback request
//! end to end:
//!
//! 1. normalize the tool arguments
//! 2. create a [`FeedbackSession`] and register it in [`ActiveSessions`]
//! 3. build the requested schema and solicitation message
//! 4. await the [`ElicitationChannel`] (the only suspension point)
//! 5. classify the result and format the tool output
//! 6. release the registry entry, whatever happened above
//!
//! Channel failures are turned into tool output here and never escape: a
//! timeout is informational (`is_error = false`) because the human may simply
//! not have answered yet, anything else is reported as an error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::channel::{ElicitRequest, ElicitationChannel, duration_millis};
use crate::config::{FEEDBACK_PLACEHOLDER, FeedbackConfig};
use crate::registry::ActiveSessions;
use crate::response::classify;
use crate::schema::build_feedback_schema;
use crate::session::{FeedbackSession, SessionStatus, generate_session_id};
use crate::tools::{DEFAULT_PROJECT_DIRECTORY, DEFAULT_SUMMARY};

/// Header of the default output format.
pub const FEEDBACK_HEADER: &str = "=== User Feedback ===";

/// Substituted for the feedback when the human left it empty.
pub const NO_FEEDBACK_CONTENT: &str = "No feedback content";

/// Informational text returned when the human has not answered in time.
pub const TIMEOUT_TEXT: &str = "Timeout notice: the MCP request timed out. This usually means the user interface did not respond in time.\n\nTo continue providing feedback, please call this tool again.";

const SOLICITATION_SUFFIX: &str = "\n\nPlease provide your feedback:";

/// Raw `interactive_feedback` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackParams {
    pub project_directory: Option<String>,
    pub summary: Option<String>,
}

impl FeedbackParams {
    /// Extract arguments from a `tools/call` `arguments` value.
    ///
    /// Missing, `null`, and non-string values are all treated as absent.
    pub fn from_arguments(arguments: Option<&Value>) -> Self {
        let field = |name: &str| {
            arguments
                .and_then(|args| args.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            project_directory: field("project_directory"),
            summary: field("summary"),
        }
    }

    /// Trimmed `(project_directory, summary)`, with defaults for blank input.
    pub fn normalize(&self) -> (String, String) {
        (
            trimmed_or(self.project_directory.as_deref(), DEFAULT_PROJECT_DIRECTORY),
            trimmed_or(self.summary.as_deref(), DEFAULT_SUMMARY),
        )
    }
}

fn trimmed_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Text returned to the calling agent, plus the MCP `isError` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Render as an MCP `CallToolResult`.
    pub fn to_call_result(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error
        })
    }
}

/// Drives feedback requests through an [`ElicitationChannel`].
///
/// Cheap to share: wrap in an `Arc` and call
/// [`Self::handle_feedback_request`] from as many tasks as needed. Requests
/// share nothing but the session registry.
#[derive(Debug)]
pub struct FeedbackOrchestrator {
    channel: Arc<dyn ElicitationChannel>,
    sessions: ActiveSessions,
    output_template: Option<String>,
    timeout: Duration,
    session_max_age: Duration,
}

impl FeedbackOrchestrator {
    pub fn new(channel: Arc<dyn ElicitationChannel>, config: &FeedbackConfig) -> Self {
        Self {
            channel,
            sessions: ActiveSessions::new(),
            output_template: config.output_template().map(str::to_string),
            timeout: config.elicitation_timeout(),
            session_max_age: config.session_max_age(),
        }
    }

    /// Registry of requests currently waiting on a human.
    pub fn sessions(&self) -> &ActiveSessions {
        &self.sessions
    }

    /// Run one `interactive_feedback` call to completion.
    pub async fn handle_feedback_request(&self, params: FeedbackParams) -> ToolOutput {
        let (project_directory, summary) = params.normalize();
        let mut session = FeedbackSession::new(generate_session_id(), project_directory, summary);
        let guard = self.sessions.register(session.snapshot());

        let output = self.solicit(&mut session).await;

        drop(guard);
        let swept = self.sessions.sweep_expired(self.session_max_age);
        tracing::debug!(
            session_id = %session.id(),
            status = %session.status(),
            response_time_ms = ?session.response_time_ms(),
            swept = swept.len(),
            active = self.sessions.len(),
            "feedback request finished"
        );
        output
    }

    async fn solicit(&self, session: &mut FeedbackSession) -> ToolOutput {
        let request = ElicitRequest {
            message: format!("{}{SOLICITATION_SUFFIX}", session.summary()),
            requested_schema: build_feedback_schema(session.summary()),
        };

        tracing::info!(
            session_id = %session.id(),
            timeout_ms = duration_millis(self.timeout),
            active = self.sessions.len(),
            "starting elicitation"
        );

        match self.channel.elicit(request, self.timeout).await {
            Ok(result) => {
                let feedback = classify(&result, session);
                tracing::info!(
                    session_id = %session.id(),
                    action = %feedback.action,
                    success = feedback.success,
                    "elicitation completed"
                );
                ToolOutput::text(format_feedback(&feedback.feedback, self.output_template.as_deref()))
            }
            Err(err) if err.is_timeout() => {
                session.update_status(SessionStatus::Error);
                tracing::warn!(session_id = %session.id(), error = %err, "elicitation timed out");
                ToolOutput::text(TIMEOUT_TEXT)
            }
            Err(err) => {
                session.update_status(SessionStatus::Error);
                tracing::error!(session_id = %session.id(), error = %err, "elicitation failed");
                ToolOutput::error(format!("Error: {err}"))
            }
        }
    }
}

/// Render feedback for the calling agent.
///
/// With a template containing `{{feedback}}`, every occurrence is replaced.
/// A template without the placeholder is ignored so the feedback is never
/// silently dropped. Empty feedback renders as [`NO_FEEDBACK_CONTENT`].
pub fn format_feedback(feedback: &str, template: Option<&str>) -> String {
    let content = if feedback.is_empty() {
        NO_FEEDBACK_CONTENT
    } else {
        feedback
    };
    match template {
        Some(t) if t.contains(FEEDBACK_PLACEHOLDER) => t.replace(FEEDBACK_PLACEHOLDER, content),
        Some(_) => {
            tracing::warn!("output template has no {FEEDBACK_PLACEHOLDER} placeholder; using default format");
            format!("{FEEDBACK_HEADER}\n{content}")
        }
        None => format!("{FEEDBACK_HEADER}\n{content}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, ElicitResult, MockChannel};

    fn orchestrator(channel: &MockChannel, template: Option<&str>) -> FeedbackOrchestrator {
        let config = FeedbackConfig {
            output_template: template.map(str::to_string),
            ..Default::default()
        };
        FeedbackOrchestrator::new(Arc::new(channel.clone()), &config)
    }

    fn params(summary: &str) -> FeedbackParams {
        FeedbackParams {
            project_directory: None,
            summary: Some(summary.to_string()),
        }
    }

    #[test]
    fn normalize_applies_defaults_and_trims() {
        let p = FeedbackParams {
            project_directory: Some("  /repo  ".to_string()),
            summary: Some("   ".to_string()),
        };
        assert_eq!(
            p.normalize(),
            ("/repo".to_string(), DEFAULT_SUMMARY.to_string())
        );
        assert_eq!(
            FeedbackParams::default().normalize(),
            (".".to_string(), DEFAULT_SUMMARY.to_string())
        );
    }

    #[test]
    fn from_arguments_ignores_non_strings() {
        let args = json!({"project_directory": 7, "summary": "done"});
        let p = FeedbackParams::from_arguments(Some(&args));
        assert!(p.project_directory.is_none());
        assert_eq!(p.summary.as_deref(), Some("done"));
        assert_eq!(FeedbackParams::from_arguments(None), FeedbackParams::default());
    }

    #[test]
    fn format_default_and_empty() {
        assert_eq!(format_feedback("ok", None), "=== User Feedback ===\nok");
        assert_eq!(
            format_feedback("", None),
            "=== User Feedback ===\nNo feedback content"
        );
    }

    #[test]
    fn format_template_replaces_every_placeholder() {
        assert_eq!(
            format_feedback("X", Some("Feedback: {{feedback}}")),
            "Feedback: X"
        );
        assert_eq!(
            format_feedback("X", Some("{{feedback}} / {{feedback}}")),
            "X / X"
        );
        assert_eq!(
            format_feedback("", Some("Got: {{feedback}}")),
            "Got: No feedback content"
        );
    }

    #[test]
    fn format_template_without_placeholder_falls_back() {
        assert_eq!(
            format_feedback("ok", Some("static text")),
            "=== User Feedback ===\nok"
        );
    }

    #[test]
    fn call_result_shape() {
        let v = ToolOutput::error("Error: x").to_call_result();
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][0]["text"], "Error: x");
        assert_eq!(v["isError"], true);
        assert_eq!(ToolOutput::text("t").to_call_result()["isError"], false);
    }

    #[tokio::test]
    async fn accept_returns_default_format_and_releases_session() {
        let channel = MockChannel::new();
        channel.push_ok(ElicitResult::accept(json!({"feedback": "ok"})));
        let orch = orchestrator(&channel, None);

        let out = orch.handle_feedback_request(params("Test")).await;
        assert_eq!(out, ToolOutput::text("=== User Feedback ===\nok"));
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn request_carries_summary_schema_and_timeout() {
        let channel = MockChannel::new();
        channel.push_ok(ElicitResult::decline());
        let orch = orchestrator(&channel, None);

        orch.handle_feedback_request(params("  Built the parser  ")).await;
        let sent = channel.requests();
        assert_eq!(sent.len(), 1);
        let (request, timeout) = &sent[0];
        assert_eq!(
            request.message,
            "Built the parser\n\nPlease provide your feedback:"
        );
        assert!(
            request.requested_schema.property("feedback").unwrap()
                .description.as_deref().unwrap()
                .ends_with("Built the parser")
        );
        assert_eq!(*timeout, Duration::from_millis(86_400_000));
    }

    #[tokio::test]
    async fn template_output() {
        let channel = MockChannel::new();
        channel.push_ok(ElicitResult::accept(json!({"feedback": "X"})));
        let orch = orchestrator(&channel, Some("Feedback: {{feedback}}"));
        let out = orch.handle_feedback_request(params("Test")).await;
        assert_eq!(out.text, "Feedback: X");
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn decline_and_cancel_are_not_errors() {
        let channel = MockChannel::new();
        channel.push_ok(ElicitResult::decline());
        channel.push_ok(ElicitResult::cancel());
        let orch = orchestrator(&channel, None);

        for _ in 0..2 {
            let out = orch.handle_feedback_request(params("Test")).await;
            assert!(!out.is_error);
            assert_eq!(out.text, "=== User Feedback ===\nNo feedback content");
        }
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_goes_through_normal_output() {
        let channel = MockChannel::new();
        channel.push_ok(ElicitResult::bare("bogus"));
        let orch = orchestrator(&channel, None);
        let out = orch.handle_feedback_request(params("Test")).await;
        assert!(!out.is_error);
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn timeout_is_informational() {
        let channel = MockChannel::new();
        channel.push_err(ChannelError::Timeout { timeout_ms: 86_400_000 });
        let orch = orchestrator(&channel, None);
        let out = orch.handle_feedback_request(params("Test")).await;
        assert!(!out.is_error);
        assert_eq!(out.text, TIMEOUT_TEXT);
        assert!(out.text.contains("call this tool again"));
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn client_side_timeout_error_is_informational() {
        let channel = MockChannel::new();
        channel.push_err(ChannelError::Rpc {
            code: -32603,
            message: "MCP error -32001: Request timed out".to_string(),
        });
        let orch = orchestrator(&channel, None);
        let out = orch.handle_feedback_request(params("Test")).await;
        assert!(!out.is_error);
        assert_eq!(out.text, TIMEOUT_TEXT);
    }

    #[tokio::test]
    async fn transport_fault_is_an_error_with_message() {
        let channel = MockChannel::new();
        channel.push_err(ChannelError::Rpc {
            code: -32603,
            message: "pipe exploded".to_string(),
        });
        let orch = orchestrator(&channel, None);
        let out = orch.handle_feedback_request(params("Test")).await;
        assert!(out.is_error);
        assert_eq!(out.text, "Error: pipe exploded");
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn session_is_registered_while_waiting() {
        let channel = MockChannel::new().with_delay(Duration::from_millis(200));
        channel.push_ok(ElicitResult::accept(json!({"feedback": "late"})));
        let orch = Arc::new(orchestrator(&channel, None));

        let task = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.handle_feedback_request(params("Test")).await })
        };

        let mut seen = false;
        for _ in 0..50 {
            if orch.sessions().len() == 1 {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(seen, "session should be registered during the wait");
        let id = orch.sessions().ids().remove(0);
        assert!(crate::session::is_valid_session_id(&id));

        let out = task.await.unwrap();
        assert_eq!(out.text, "=== User Feedback ===\nlate");
        assert!(!orch.sessions().contains(&id));
    }
}
