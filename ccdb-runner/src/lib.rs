//! # Claude Code CLI runner
//!
//! A small SDK for supervising one `claude` CLI subprocess: spawn it in
//! stream-json mode, consume its stdout as typed events, and interrupt or
//! kill it on demand.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ccdb_runner::{ClaudeRunner, RunnerOptions};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> ccdb_runner::Result<()> {
//!     let runner = ClaudeRunner::new(RunnerOptions::default());
//!     let mut events = runner.run("What is 2 + 2?", None).await?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{event:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod errors;
mod parser;
mod runner;
mod types;

pub use errors::{Result, RunnerError};
pub use parser::parse_line;
pub use runner::{ClaudeRunner, EventStream, find_claude_cli};
pub use types::{
    AskOption, AskQuestion, MessageKind, RunnerOptions, RunnerOptionsBuilder, StreamEvent,
    ToolCategory, ToolUse, categorize_tool,
};
