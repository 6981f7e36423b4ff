//! CLI argument types for mcp-feedback-elicitation.
//!
//! Defines the top-level [`Cli`] struct and all subcommand [`Args`] using
//! clap's derive macros. Each subcommand maps to a module in [`crate::commands`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// MCP server that collects human feedback through elicitation
#[derive(Parser, Debug)]
#[command(name = "mcp-feedback-elicitation", version, about)]
pub struct Cli {
    /// Path to a TOML config file (default: <config dir>/mcp-feedback/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run (default: serve)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the MCP server on stdin/stdout
    Serve(ServeArgs),
    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `serve` subcommand
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// How long to wait for the human, in milliseconds
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Output template; `{{feedback}}` is replaced with the feedback text
    #[arg(long)]
    pub template: Option<String>,

    /// Replacement tool description / usage prompt
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Arguments for the `config` subcommand
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
