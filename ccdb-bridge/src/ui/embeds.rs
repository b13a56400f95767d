//! Embed builders for Claude Code events.

use ccdb_runner::{ToolCategory, ToolUse};

use crate::gateway::Embed;

pub const COLOR_INFO: u32 = 0x5865F2; // Discord blurple
pub const COLOR_SUCCESS: u32 = 0x57F287; // Green
pub const COLOR_ERROR: u32 = 0xED4245; // Red
pub const COLOR_TOOL: u32 = 0xFEE75C; // Yellow
pub const COLOR_THINKING: u32 = 0x9B59B6; // Purple
pub const COLOR_ASK: u32 = 0x3498DB; // Blue
pub const COLOR_STOPPED: u32 = 0xFFA500; // Orange
pub const COLOR_MUTED: u32 = 0x95A5A6; // Grey

/// Context usage above this triggers the auto-compact warning.
pub const AUTOCOMPACT_THRESHOLD: f64 = 83.5;

const EMBED_TITLE_MAX: usize = 256;
const EMBED_DESCRIPTION_MAX: usize = 4096;

pub fn category_icon(category: ToolCategory) -> &'static str {
    match category {
        ToolCategory::Read => "📖",
        ToolCategory::Edit => "✏️",
        ToolCategory::Command => "🔧",
        ToolCategory::Web => "🌐",
        ToolCategory::Think => "💭",
        ToolCategory::Ask => "❓",
        ToolCategory::Other => "🤖",
    }
}

fn clamp_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Embed for a tool use event.
///
/// The title carries only the operation summary so it stays stable across
/// timer ticks; elapsed time goes into the description.
pub fn tool_use_embed(tool: &ToolUse, in_progress: bool, elapsed_s: Option<u64>) -> Embed {
    let icon = category_icon(tool.category);
    let suffix = if in_progress { "..." } else { "" };
    let title = format!("{icon} {}{suffix}", tool.display_name());

    let mut embed = Embed::new()
        .title(clamp_chars(&title, EMBED_TITLE_MAX))
        .color(if in_progress { COLOR_TOOL } else { COLOR_INFO });
    if in_progress && let Some(elapsed) = elapsed_s {
        embed = embed.description(format!("⏳ {elapsed}s elapsed..."));
    }
    embed
}

/// Embed for session start.
pub fn session_start_embed(session_id: Option<&str>) -> Embed {
    let mut embed = Embed::new()
        .title("🤖 Claude Code session started")
        .color(COLOR_INFO);
    if let Some(sid) = session_id {
        embed = embed.footer(format!("Session: {}...", clamp_chars(sid, 8)));
    }
    embed
}

fn format_tokens(n: i64) -> String {
    if n >= 1000 {
        format!("{:.1}k", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

/// Embed for session completion.
#[allow(clippy::too_many_arguments)]
pub fn session_complete_embed(
    cost_usd: Option<f64>,
    duration_ms: Option<i64>,
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    cache_read_tokens: Option<i64>,
    context_window: Option<i64>,
    cache_creation_tokens: Option<i64>,
) -> Embed {
    let mut parts: Vec<String> = Vec::new();
    if let Some(ms) = duration_ms {
        parts.push(format!("⏱️ {:.1}s", ms as f64 / 1000.0));
    }
    if let Some(cost) = cost_usd {
        parts.push(format!("💰 ${cost:.4}"));
    }
    if let (Some(input), Some(output)) = (input_tokens, output_tokens) {
        let mut token_str = format!("📊 {}↑ {}↓", format_tokens(input), format_tokens(output));
        if let Some(cache_read) = cache_read_tokens.filter(|n| *n > 0) {
            let total = input + cache_read;
            let hit_pct = if total > 0 {
                (cache_read as f64 / total as f64 * 100.0) as i64
            } else {
                0
            };
            token_str.push_str(&format!(" ({hit_pct}% cache)"));
        }
        parts.push(token_str);
    }

    // Context usage counts prompt tokens only (input + cache reads/creation).
    // Output tokens are not yet "in" the window; they arrive as cached input
    // on the next turn.
    let usage_pct = match (context_window, input_tokens) {
        (Some(window), Some(input)) if window > 0 => {
            let used = input + cache_read_tokens.unwrap_or(0) + cache_creation_tokens.unwrap_or(0);
            let pct = (used as f64 / window as f64 * 100.0).min(100.0);
            let mut ctx_str = format!("📊 {pct:.0}% ctx");
            if pct < AUTOCOMPACT_THRESHOLD {
                ctx_str.push_str(&format!(" ({:.0}% until compact)", AUTOCOMPACT_THRESHOLD - pct));
            } else {
                ctx_str.push_str(" ⚠️");
            }
            parts.push(ctx_str);
            Some(pct)
        },
        _ => None,
    };

    let mut embed = Embed::new().title("✅ Done").color(COLOR_SUCCESS);
    if !parts.is_empty() {
        embed = embed.description(parts.join(" | "));
    }
    if let Some(pct) = usage_pct.filter(|pct| *pct >= AUTOCOMPACT_THRESHOLD) {
        embed = embed.footer(format!(
            "⚠️ Context {pct:.0}% full — auto-compact may run on next turn"
        ));
    }
    embed
}

/// Embed for a completed tool with its result.
///
/// Replaces the in-progress tool embed once the result is available. Output
/// goes in the description (4096-char limit) rather than a field (1024) so
/// ~30 lines fit without truncation.
pub fn tool_result_embed(tool_title: &str, result_content: &str) -> Embed {
    let title = tool_title.trim_end_matches('.');
    let mut embed = Embed::new()
        .title(clamp_chars(title, EMBED_TITLE_MAX))
        .color(COLOR_INFO);
    if !result_content.is_empty() {
        // Reserve 8 chars for the code fence markers.
        let display = clamp_chars(result_content, EMBED_DESCRIPTION_MAX - 8);
        embed = embed.description(format!("```\n{display}\n```"));
    }
    embed
}

/// Embed for extended thinking content.
///
/// Uses a plain code block (no spoiler) so the text is rendered with
/// Discord's code-block foreground in both themes; spoiler-wrapped code
/// blocks inside embed descriptions pick up the accent color instead.
pub fn thinking_embed(thinking_text: &str) -> Embed {
    let notice = "\n... (truncated)";
    let max_text = EMBED_DESCRIPTION_MAX - 8 - notice.len();
    let mut truncated = clamp_chars(thinking_text, max_text);
    if thinking_text.chars().count() > max_text {
        truncated.push_str(notice);
    }
    Embed::new()
        .title("💭 Thinking")
        .description(format!("```\n{truncated}\n```"))
        .color(COLOR_THINKING)
}

/// Placeholder embed for a redacted_thinking block.
pub fn redacted_thinking_embed() -> Embed {
    Embed::new()
        .title("🔒 Thinking (redacted)")
        .description("Some reasoning was performed but cannot be shown.")
        .color(COLOR_MUTED)
}

/// Embed for errors.
pub fn error_embed(error: &str) -> Embed {
    Embed::new()
        .title("❌ Error")
        .description(clamp_chars(error, 4000))
        .color(COLOR_ERROR)
}

/// Embed for session timeout with actionable guidance.
pub fn timeout_embed(seconds: u64) -> Embed {
    Embed::new()
        .title("⏱️ Session timed out")
        .description(format!(
            "No response received for {seconds} seconds.\n\n\
             **What to do:**\n\
             • Send a message to resume the session\n\
             • Use `/clear` to start fresh"
        ))
        .color(COLOR_ERROR)
}

/// Pick the timeout embed for `Timed out after N seconds` errors, the
/// generic error embed otherwise.
pub fn make_error_embed(error: &str) -> Embed {
    if let Some(seconds) = error
        .strip_prefix("Timed out after ")
        .and_then(|rest| rest.strip_suffix(" seconds"))
        .and_then(|n| n.parse::<u64>().ok())
    {
        timeout_embed(seconds)
    } else {
        error_embed(error)
    }
}

/// Embed for an interactive question prompt.
pub fn ask_embed(question: &str, header: &str) -> Embed {
    let title = if header.is_empty() {
        "❓ Claude needs your input".to_string()
    } else {
        format!("❓ {header}")
    };
    Embed::new()
        .title(clamp_chars(&title, EMBED_TITLE_MAX))
        .description(clamp_chars(question, EMBED_DESCRIPTION_MAX))
        .color(COLOR_ASK)
}

/// Embed posted in the target thread when a message is relayed into it.
pub fn relay_received_embed(source_thread_id: i64, message: &str) -> Embed {
    Embed::new()
        .title("📨 Relayed message")
        .description(format!(
            "From <#{source_thread_id}>:\n\n{}",
            clamp_chars(message, 3800)
        ))
        .color(COLOR_INFO)
}

/// Confirmation embed posted in the source thread after a relay.
pub fn relay_sent_embed(target_thread_id: i64, message: &str) -> Embed {
    Embed::new()
        .title("📤 Relayed")
        .description(format!(
            "To <#{target_thread_id}>:\n\n{}",
            clamp_chars(message, 3800)
        ))
        .color(COLOR_INFO)
}

/// Embed for a manually stopped session.
pub fn stopped_embed() -> Embed {
    Embed::new()
        .title("⏹️ Session stopped")
        .description(
            "The session was stopped.\n\n\
             The session is preserved — send a message to resume, \
             or use `/clear` to start fresh.",
        )
        .color(COLOR_STOPPED)
}
