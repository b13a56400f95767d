//! Runtime configuration, loaded from the environment.
//!
//! The variable names are a fixed operational contract shared with the
//! deployment scripts, so values are read directly from the process
//! environment (after an optional `.env` load in `main`).

use std::collections::HashSet;
use std::env;

use crate::errors::{BridgeError, Result};

/// Default context window used for the done-embed usage banner.
const DEFAULT_CONTEXT_WINDOW: i64 = 200_000;

/// Full bridge configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord: DiscordConfig,
    pub claude: ClaudeConfig,
    pub api: ApiConfig,
}

/// Discord-side configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token (required)
    pub token: String,
    /// The watched channel; new conversations start here (required)
    pub channel_id: i64,
    /// Owner user id, if any
    pub owner_id: Option<i64>,
    /// Shared coordination / lounge channel
    pub coordination_channel_id: Option<i64>,
    /// When set, only these user ids may talk to the bot
    pub allowed_user_ids: Option<HashSet<i64>>,
}

/// Claude CLI configuration.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub command: String,
    pub model: String,
    pub permission_mode: String,
    pub working_dir: Option<String>,
    pub timeout_seconds: u64,
    pub max_concurrent_sessions: usize,
    /// Model context window, used for the usage banner on the done embed
    pub context_window: i64,
}

/// Embedded HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Bearer token; when set every path except the health check requires it
    pub secret: Option<String>,
}

impl Settings {
    /// Load and validate configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let token = require("DISCORD_BOT_TOKEN")?;
        let channel_id = require("DISCORD_CHANNEL_ID")?
            .parse::<i64>()
            .map_err(|_| BridgeError::Config("DISCORD_CHANNEL_ID must be an integer".into()))?;

        let allowed_user_ids = env::var("ALLOWED_USER_IDS").ok().and_then(|raw| {
            let ids: HashSet<i64> = raw
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect();
            if ids.is_empty() { None } else { Some(ids) }
        });

        Ok(Self {
            discord: DiscordConfig {
                token,
                channel_id,
                owner_id: optional_int("DISCORD_OWNER_ID"),
                coordination_channel_id: optional_int("COORDINATION_CHANNEL_ID"),
                allowed_user_ids,
            },
            claude: ClaudeConfig {
                command: env::var("CLAUDE_COMMAND").unwrap_or_else(|_| "claude".into()),
                model: env::var("CLAUDE_MODEL").unwrap_or_else(|_| "sonnet".into()),
                permission_mode: env::var("CLAUDE_PERMISSION_MODE")
                    .unwrap_or_else(|_| "acceptEdits".into()),
                working_dir: env::var("CLAUDE_WORKING_DIR").ok().filter(|s| !s.is_empty()),
                timeout_seconds: optional_int("SESSION_TIMEOUT_SECONDS").unwrap_or(300) as u64,
                max_concurrent_sessions: optional_int("MAX_CONCURRENT_SESSIONS").unwrap_or(3)
                    as usize,
                context_window: optional_int("CLAUDE_CONTEXT_WINDOW")
                    .unwrap_or(DEFAULT_CONTEXT_WINDOW),
            },
            api: ApiConfig {
                enabled: env::var("API_ENABLED")
                    .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                    .unwrap_or(true),
                host: "127.0.0.1".into(),
                port: optional_int("API_PORT").unwrap_or(8080) as u16,
                secret: env::var("API_SECRET_KEY").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::Config(format!("{key} is required")))
}

fn optional_int(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
