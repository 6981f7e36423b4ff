//! mcp-feedback-elicitation: MCP server that collects human feedback through
//! elicitation.
//!
//! # Subcommands
//!
//! - `serve`: start the MCP server on stdin/stdout (default)
//! - `config`: show resolved configuration

use clap::Parser;

use feedback_mcp::cli::{Cli, Commands, ServeArgs};
use feedback_mcp::{commands, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::run(&cli.config, args).await,
        Some(Commands::Config(args)) => commands::config_cmd::run(&cli.config, args).await,
        None => commands::serve::run(&cli.config, ServeArgs::default()).await,
    }
}
