//! `config` subcommand: show resolved configuration.
//!
//! Prints the configuration the server would run with, either as JSON
//! (`--json`) or as a human-readable key=value table.

use std::path::PathBuf;

use crate::cli::ConfigArgs;
use crate::config::{default_config_path, resolve_config};
use crate::response::truncate_chars;

/// Longest description shown in the table view.
const DESCRIPTION_PREVIEW_CHARS: usize = 60;

/// Run the `config` subcommand.
///
/// # Errors
///
/// Returns an error if config resolution fails (e.g. unreadable or invalid
/// TOML file).
pub async fn run(config_path: &Option<PathBuf>, args: ConfigArgs) -> anyhow::Result<()> {
    let cfg = resolve_config(config_path.as_deref())?;

    if args.json {
        let json = serde_json::to_string_pretty(&cfg)?;
        println!("{json}");
        return Ok(());
    }

    let source = config_path
        .clone()
        .or_else(default_config_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<none>".to_string());
    let description = cfg.tool_description().replace('\n', " ");

    println!("mcp-feedback-elicitation configuration:");
    println!("  config_file             = {source}");
    println!(
        "  tool_description        = {}",
        truncate_chars(&description, DESCRIPTION_PREVIEW_CHARS)
    );
    println!(
        "  output_template         = {}",
        cfg.output_template().unwrap_or("<default>")
    );
    println!("  elicitation_timeout_ms  = {}", cfg.elicitation_timeout_ms);
    println!("  session_max_age_secs    = {}", cfg.session_max_age_secs);
    println!("  heartbeat_interval_secs = {}", cfg.heartbeat_interval_secs);

    Ok(())
}
