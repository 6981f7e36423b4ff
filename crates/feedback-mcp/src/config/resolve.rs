//! Config resolution for mcp-feedback-elicitation.
//!
//! Resolves [`FeedbackConfig`] with the following priority (highest first):
//!
//! 1. CLI flags (applied by the caller after [`resolve_config`] returns)
//! 2. Environment variables (`FEEDBACK_PROMPT`, `FEEDBACK_TEMPLATE`,
//!    `FEEDBACK_MCP_*`)
//! 3. TOML file: the explicit `--config` path, else
//!    `<config_dir>/mcp-feedback/config.toml` when it exists
//! 4. Compiled-in defaults (via [`FeedbackConfig::default`])

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::FeedbackConfig;

/// Overrides the advertised tool description.
pub const ENV_PROMPT: &str = "FEEDBACK_PROMPT";
/// Output template containing `{{feedback}}`.
pub const ENV_TEMPLATE: &str = "FEEDBACK_TEMPLATE";
/// Elicitation timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "FEEDBACK_MCP_TIMEOUT_MS";
/// Registry sweep age in seconds.
pub const ENV_SESSION_MAX_AGE_SECS: &str = "FEEDBACK_MCP_SESSION_MAX_AGE_SECS";

/// Default config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mcp-feedback").join("config.toml"))
}

/// Resolve the complete configuration.
///
/// # Errors
///
/// Returns an error if an explicit `config_path` cannot be read, or if any
/// config file that is read fails to parse. A missing default config file is
/// not an error.
pub fn resolve_config(config_path: Option<&Path>) -> anyhow::Result<FeedbackConfig> {
    let mut cfg = match config_path {
        Some(path) => load_file(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => load_file(&path)?,
            _ => FeedbackConfig::default(),
        },
    };

    apply_env_overrides(&mut cfg);
    tracing::debug!(?cfg, "resolved configuration");
    Ok(cfg)
}

fn load_file(path: &Path) -> anyhow::Result<FeedbackConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(cfg)
}

/// Apply environment overrides to `cfg`.
///
/// Empty string values are treated as "not set". Numeric variables that do
/// not parse are ignored with a warning.
fn apply_env_overrides(cfg: &mut FeedbackConfig) {
    if let Ok(v) = std::env::var(ENV_PROMPT) {
        if !v.trim().is_empty() {
            cfg.tool_description = Some(v);
        }
    }
    if let Ok(v) = std::env::var(ENV_TEMPLATE) {
        if !v.trim().is_empty() {
            cfg.output_template = Some(v);
        }
    }
    if let Ok(v) = std::env::var(ENV_TIMEOUT_MS) {
        match v.trim().parse::<u64>() {
            Ok(ms) => cfg.elicitation_timeout_ms = ms,
            Err(e) => tracing::warn!(var = ENV_TIMEOUT_MS, value = %v, "ignoring invalid value: {e}"),
        }
    }
    if let Ok(v) = std::env::var(ENV_SESSION_MAX_AGE_SECS) {
        match v.trim().parse::<u64>() {
            Ok(secs) => cfg.session_max_age_secs = secs,
            Err(e) => {
                tracing::warn!(var = ENV_SESSION_MAX_AGE_SECS, value = %v, "ignoring invalid value: {e}")
            }
        }
    }
}
