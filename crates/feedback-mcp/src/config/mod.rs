//! Configuration resolution for mcp-feedback-elicitation.
//!
//! The entry point is [`resolve_config`], which layers an optional TOML file,
//! environment variables, and defaults into a [`FeedbackConfig`].
//!
//! See [`resolve`] for the full priority chain and [`types`] for the config type.

mod resolve;
mod types;

pub use resolve::{
    ENV_PROMPT, ENV_SESSION_MAX_AGE_SECS, ENV_TEMPLATE, ENV_TIMEOUT_MS, default_config_path,
    resolve_config,
};
pub use types::{DEFAULT_ELICITATION_TIMEOUT_MS, FEEDBACK_PLACEHOLDER, FeedbackConfig};
