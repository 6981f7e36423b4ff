//! MCP tool definition for `interactive_feedback`.
//!
//! The server exposes exactly one tool. Its description doubles as the usage
//! policy for the calling agent and can be replaced through
//! [`crate::config::FeedbackConfig::tool_description`].

use serde_json::{Value, json};

/// Name of the single tool exposed by the server.
pub const TOOL_NAME: &str = "interactive_feedback";

/// Default for the `project_directory` argument.
pub const DEFAULT_PROJECT_DIRECTORY: &str = ".";

/// Default for the `summary` argument.
pub const DEFAULT_SUMMARY: &str = "I have completed the task you requested.";

/// Built-in tool description / agent usage policy.
pub const DEFAULT_FEEDBACK_PROMPT: &str = "Interactive feedback collection tool for LLM agents.

USAGE RULES:
1. During any process, task, or conversation, whether asking, replying, or completing phased tasks, you must call this tool to ask for feedback.
2. Unless receiving termination instructions, all steps must repeatedly call this tool.
3. Whenever user feedback is received, if the feedback content is not empty, you must call this tool again and adjust behavior based on the feedback content.
4. Only when the user explicitly indicates \"end\" or \"no more interaction needed\" can you stop calling this tool, and the process is considered complete.
5. Summarize what you have done and pass the project directory, so the user knows what to review before giving feedback for the next step.

Args:
    project_directory: Project directory path for context
    summary: Summary of AI work completed for user review

Returns:
    Text content containing the user's feedback";

/// Full tool definition as listed in `tools/list`.
pub fn feedback_tool(description: &str) -> Value {
    json!({
        "name": TOOL_NAME,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "project_directory": {
                    "type": "string",
                    "description": "Project directory path",
                    "default": DEFAULT_PROJECT_DIRECTORY
                },
                "summary": {
                    "type": "string",
                    "description": "Summary of the work completed",
                    "default": DEFAULT_SUMMARY
                }
            },
            "required": []
        }
    })
}

/// Result payload for `tools/list`.
pub fn tools_list_result(description: &str) -> Value {
    json!({ "tools": [feedback_tool(description)] })
}
