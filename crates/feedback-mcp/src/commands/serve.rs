//! `serve` subcommand: run the MCP server on stdin/stdout.
//!
//! See [`crate::server`] for the protocol loop and [`crate::framing`] for
//! framing details.

use std::path::PathBuf;

use crate::cli::ServeArgs;
use crate::config::{FeedbackConfig, resolve_config};
use crate::server::FeedbackServer;

/// Run the `serve` subcommand.
///
/// Resolves configuration, applies CLI overrides, then serves until stdin
/// reaches EOF.
///
/// # Errors
///
/// Returns an error if configuration resolution fails or reading stdin fails.
pub async fn run(config_path: &Option<PathBuf>, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = resolve_config(config_path.as_deref())?;
    apply_overrides(&mut config, &args);

    tracing::info!(
        timeout_ms = config.elicitation_timeout_ms,
        custom_template = config.output_template().is_some(),
        custom_prompt = config.tool_description.is_some(),
        "configuration resolved"
    );

    let server = FeedbackServer::new(config);
    server.run(tokio::io::stdin(), tokio::io::stdout()).await
}

/// Apply command-line overrides, which win over file and environment.
pub fn apply_overrides(config: &mut FeedbackConfig, args: &ServeArgs) {
    if let Some(timeout_ms) = args.timeout_ms {
        config.elicitation_timeout_ms = timeout_ms;
    }
    if let Some(ref template) = args.template {
        config.output_template = Some(template.clone());
    }
    if let Some(ref prompt) = args.prompt {
        config.tool_description = Some(prompt.clone());
    }
}
