//! # claude-discord-bridge
//!
//! A Discord-fronted supervisor for the Claude Code CLI: human prompts come
//! in from a watched channel, each conversation thread gets its own CLI
//! subprocess (via [`ccdb_runner`]), and the streaming output is rendered
//! incrementally as Discord messages, embeds, reactions and controls.
//!
//! The crate is organized around the seams the binary wires together:
//! [`gateway`] (the Discord transport trait), [`processor`] (the event
//! state machine), [`supervisor`] (per-thread lifecycle), [`db`]
//! (persistence), [`ask`] (interactive questions), [`scheduler`] and
//! [`api`] (the embedded REST surface).

pub mod api;
pub mod ask;
pub mod config;
pub mod coordination;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod handler;
pub mod lounge;
pub mod processor;
pub mod registry;
pub mod runs;
pub mod scheduler;
pub mod skills;
pub mod supervisor;
pub mod ui;

pub use config::Settings;
pub use errors::{BridgeError, Result};
