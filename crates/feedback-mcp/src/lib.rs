//! mcp-feedback-elicitation library crate.
//!
//! Provides the `interactive_feedback` MCP server: session tracking, the
//! elicitation schema, response classification, the feedback orchestrator,
//! stdio framing, configuration, and CLI types. Exposed as a library for
//! integration testing.

pub mod channel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod elicitation;
pub mod framing;
pub mod logging;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;

#[doc(inline)]
pub use channel::{ChannelError, ElicitationChannel, MockChannel};
#[doc(inline)]
pub use orchestrator::{FeedbackOrchestrator, FeedbackParams, ToolOutput};
#[doc(inline)]
pub use server::FeedbackServer;
