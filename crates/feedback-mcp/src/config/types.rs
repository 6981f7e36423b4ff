//! Configuration types for mcp-feedback-elicitation.
//!
//! [`FeedbackConfig`] is deserialized from an optional TOML file and then
//! overlaid with environment variables and CLI flags (see
//! [`super::resolve`]). Every field has a default, so an absent or empty file
//! yields a fully working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tools::DEFAULT_FEEDBACK_PROMPT;

/// Placeholder substituted with the user's feedback in
/// [`FeedbackConfig::output_template`].
pub const FEEDBACK_PLACEHOLDER: &str = "{{feedback}}";

/// Default elicitation timeout: 24 hours.
pub const DEFAULT_ELICITATION_TIMEOUT_MS: u64 = 86_400_000;

/// Resolved server configuration.
///
/// # Example config file
///
/// ```toml
/// tool_description = "Ask the user before finishing."
/// output_template = "User said: {{feedback}}"
/// elicitation_timeout_ms = 600000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Replacement for the advertised `interactive_feedback` description.
    /// Blank values fall back to the built-in prompt.
    #[serde(default)]
    pub tool_description: Option<String>,

    /// Output template containing `{{feedback}}`. Blank values fall back to
    /// the default `=== User Feedback ===` format.
    #[serde(default)]
    pub output_template: Option<String>,

    /// How long to wait for the human, in milliseconds (default: 24 h).
    #[serde(default = "default_elicitation_timeout_ms")]
    pub elicitation_timeout_ms: u64,

    /// Registry entries older than this are swept (default: 25 h).
    #[serde(default = "default_session_max_age_secs")]
    pub session_max_age_secs: u64,

    /// Interval of the registry sweep / heartbeat log (default: `60`).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_elicitation_timeout_ms() -> u64 {
    DEFAULT_ELICITATION_TIMEOUT_MS
}

fn default_session_max_age_secs() -> u64 {
    25 * 60 * 60
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            tool_description: None,
            output_template: None,
            elicitation_timeout_ms: default_elicitation_timeout_ms(),
            session_max_age_secs: default_session_max_age_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl FeedbackConfig {
    /// Description advertised for the tool in `tools/list`.
    pub fn tool_description(&self) -> &str {
        non_blank(self.tool_description.as_deref()).unwrap_or(DEFAULT_FEEDBACK_PROMPT)
    }

    /// Output template, if a non-blank one is configured.
    pub fn output_template(&self) -> Option<&str> {
        non_blank(self.output_template.as_deref())
    }

    pub fn elicitation_timeout(&self) -> Duration {
        Duration::from_millis(self.elicitation_timeout_ms)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    /// Heartbeat period, never shorter than one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
