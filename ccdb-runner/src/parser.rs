//! Parser for Claude Code CLI stream-json output.
//!
//! Each line of stdout is one JSON object. This module turns a line into a
//! typed [`StreamEvent`], or nothing for empty, unparseable or unknown-kind
//! lines.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::types::{
    AskOption, AskQuestion, MessageKind, StreamEvent, ToolUse, categorize_tool,
};

/// Parse a single line of stream-json output into a [`StreamEvent`].
///
/// Returns `None` if the line is empty, unparseable, or of an unknown kind.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let data: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => {
            let preview: String = line.chars().take(200).collect();
            warn!("Failed to parse stream-json line: {preview}");
            return None;
        },
    };

    let kind_str = data.get("type").and_then(Value::as_str).unwrap_or_default();
    let Some(kind) = MessageKind::from_wire(kind_str) else {
        debug!("Unknown message type: {kind_str}");
        return None;
    };

    let mut event = StreamEvent::new(kind);
    match kind {
        MessageKind::System => parse_system(&data, &mut event),
        MessageKind::Assistant => parse_assistant(&data, &mut event),
        MessageKind::User => parse_user(&data, &mut event),
        MessageKind::Result => parse_result(&data, &mut event),
    }

    Some(event)
}

/// System message: carries session_id on init and hook feedback.
fn parse_system(data: &Value, event: &mut StreamEvent) {
    event.session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .map(String::from);
    if data.get("subtype").and_then(Value::as_str) == Some("init") {
        info!("Session initialized: {:?}", event.session_id);
    }
}

/// Assistant message: text, thinking and tool_use content blocks.
///
/// `is_partial` is set when `stop_reason` is null/missing, meaning the model
/// is still generating. With `--include-partial-messages` many partial events
/// arrive before the final complete one (`stop_reason` of `end_turn` or
/// `tool_use`), each carrying the full accumulated text so far.
fn parse_assistant(data: &Value, event: &mut StreamEvent) {
    let message = data.get("message").cloned().unwrap_or(Value::Null);
    event.is_partial = message
        .get("stop_reason")
        .map(Value::is_null)
        .unwrap_or(true);

    let empty = Vec::new();
    let content = message
        .get("content")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut text_parts: Vec<&str> = Vec::new();
    let mut thinking_parts: Vec<&str> = Vec::new();

    for block in content {
        match block.get("type").and_then(Value::as_str).unwrap_or_default() {
            "text" => {
                if let Some(text) = block.get("text").and_then(Value::as_str)
                    && !text.is_empty()
                {
                    text_parts.push(text);
                }
            },
            "tool_use" => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let input = block
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                if name == "AskUserQuestion" {
                    event.ask_questions = parse_ask_questions(&input);
                }
                event.tool_use = Some(ToolUse {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    category: categorize_tool(&name),
                    name,
                    input,
                });
            },
            "thinking" => {
                if let Some(thinking) = block.get("thinking").and_then(Value::as_str)
                    && !thinking.is_empty()
                {
                    thinking_parts.push(thinking);
                }
            },
            "redacted_thinking" => {
                event.has_redacted_thinking = true;
            },
            _ => {},
        }
    }

    if !text_parts.is_empty() {
        event.text = Some(text_parts.join("\n"));
    }
    if !thinking_parts.is_empty() {
        event.thinking = Some(thinking_parts.join("\n"));
    }
}

/// User message: the first tool_result block with its content.
fn parse_user(data: &Value, event: &mut StreamEvent) {
    let empty = Vec::new();
    let content = data
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    for block in content {
        if block.get("type").and_then(Value::as_str) != Some("tool_result") {
            continue;
        }
        event.tool_result_id = Some(
            block
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        );
        // Content may be a plain string or a list of {type: "text"} blocks.
        match block.get("content") {
            Some(Value::String(s)) if !s.is_empty() => {
                event.tool_result_content = Some(s.clone());
            },
            Some(Value::Array(parts)) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect();
                if !texts.is_empty() {
                    event.tool_result_content = Some(texts.join("\n"));
                }
            },
            _ => {},
        }
        break;
    }
}

/// Result message: run complete, with cost/duration/usage counters.
fn parse_result(data: &Value, event: &mut StreamEvent) {
    event.is_complete = true;
    event.session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .map(String::from);
    // Older CLI generations emitted `cost_usd`; newer ones `total_cost_usd`.
    event.cost_usd = data
        .get("cost_usd")
        .or_else(|| data.get("total_cost_usd"))
        .and_then(Value::as_f64);
    event.duration_ms = data.get("duration_ms").and_then(Value::as_i64);

    if let Some(usage) = data.get("usage") {
        event.input_tokens = usage.get("input_tokens").and_then(Value::as_i64);
        event.output_tokens = usage.get("output_tokens").and_then(Value::as_i64);
        event.cache_read_tokens = usage.get("cache_read_input_tokens").and_then(Value::as_i64);
        event.cache_creation_tokens = usage
            .get("cache_creation_input_tokens")
            .and_then(Value::as_i64);
    }

    if let Some(text) = data.get("result").and_then(Value::as_str)
        && !text.is_empty()
    {
        event.text = Some(text.to_string());
    }

    if data.get("subtype").and_then(Value::as_str) == Some("error") {
        event.error = Some(
            data.get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
        );
    }
}

/// Parse an AskUserQuestion tool input into questions.
fn parse_ask_questions(input: &Value) -> Vec<AskQuestion> {
    let empty = Vec::new();
    let questions = input
        .get("questions")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    questions
        .iter()
        .map(|q| AskQuestion {
            question: q
                .get("question")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            header: q
                .get("header")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            multi_select: q
                .get("multiSelect")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            options: q
                .get("options")
                .and_then(Value::as_array)
                .unwrap_or(&empty)
                .iter()
                .filter_map(|o| {
                    let label = o.get("label").and_then(Value::as_str).unwrap_or_default();
                    if label.is_empty() {
                        return None;
                    }
                    Some(AskOption {
                        label: label.to_string(),
                        description: o
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect(),
        })
        .collect()
}
