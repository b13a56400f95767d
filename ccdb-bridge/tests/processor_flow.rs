//! End-to-end event-processor scenarios against the mock gateway, with
//! events produced by the real stream-json parser.

use std::sync::Arc;

use serde_json::json;

use ccdb_bridge::gateway::{Gateway, MockGateway};
use ccdb_bridge::processor::{EventProcessor, RunConfig};
use ccdb_runner::{ClaudeRunner, RunnerOptions, StreamEvent, parse_line};

const THREAD: i64 = 42;

fn processor(gateway: &Arc<MockGateway>) -> EventProcessor {
    processor_with_session(gateway, None)
}

fn processor_with_session(
    gateway: &Arc<MockGateway>,
    session_id: Option<&str>,
) -> EventProcessor {
    let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
    let runner = Arc::new(ClaudeRunner::new(RunnerOptions::default()));
    let mut config = RunConfig::new(THREAD, dyn_gateway, runner, "prompt");
    config.session_id = session_id.map(String::from);
    config.context_window = Some(200_000);
    EventProcessor::new(config)
}

fn event(value: serde_json::Value) -> StreamEvent {
    parse_line(&value.to_string()).expect("fixture must parse")
}

fn system_event(sid: &str) -> StreamEvent {
    event(json!({"type": "system", "subtype": "init", "session_id": sid}))
}

fn result_event(sid: &str, text: &str) -> StreamEvent {
    event(json!({
        "type": "result", "subtype": "success", "session_id": sid,
        "result": text, "cost_usd": 0.01, "duration_ms": 500
    }))
}

#[tokio::test]
async fn happy_path_single_turn() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("ab12")).await;
    p.process(result_event("ab12", "hi")).await;
    p.finalize().await;

    // Session started embed, exactly once.
    assert_eq!(gateway.embeds_titled("🤖 Claude Code session started").len(), 1);
    // The result text, posted once.
    assert_eq!(gateway.text_contents(), vec!["hi".to_string()]);
    // The done embed with cost and duration.
    let done = gateway.embeds_titled("✅ Done");
    assert_eq!(done.len(), 1);
    let desc = done[0].message.embed.as_ref().unwrap().description.clone().unwrap();
    assert!(desc.contains("⏱️ 0.5s"));
    assert!(desc.contains("💰 $0.0100"));
    assert_eq!(p.session_id(), Some("ab12"));
}

#[tokio::test]
async fn duplicate_system_events_post_one_start_embed() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("ab34")).await;
    p.process(system_event("ab34")).await;
    p.process(system_event("ab34")).await;
    p.process(result_event("ab34", "")).await;
    p.finalize().await;

    assert_eq!(gateway.embeds_titled("🤖 Claude Code session started").len(), 1);
}

#[tokio::test]
async fn resumed_run_posts_no_start_embed() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor_with_session(&gateway, Some("ab56"));

    p.process(system_event("ab56")).await;
    p.process(result_event("ab56", "continuing")).await;
    p.finalize().await;

    assert!(gateway.embeds_titled("🤖 Claude Code session started").is_empty());
}

#[tokio::test]
async fn partial_streaming_with_tool() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("cd12")).await;
    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": null, "content": [{"type": "text", "text": "I'll"}]}
    })))
    .await;
    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": null, "content": [{"type": "text", "text": "I'll read"}]}
    })))
    .await;
    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "tool_use", "content": [
            {"type": "text", "text": "I'll read the file."},
            {"type": "tool_use", "id": "t1", "name": "Read",
             "input": {"file_path": "/tmp/x.py"}}
        ]}
    })))
    .await;
    p.process(event(json!({
        "type": "user",
        "message": {"content": [{
            "type": "tool_result", "tool_use_id": "t1", "content": "print('hi')"
        }]}
    })))
    .await;
    p.process(event(json!({
        "type": "result", "subtype": "success", "session_id": "cd12",
        "result": "Done.", "cost_usd": 0.02, "duration_ms": 1200
    })))
    .await;
    p.finalize().await;

    // At most one message carries the streamed text, edited in place.
    let texts = gateway.text_contents();
    assert_eq!(
        texts,
        vec!["I'll read the file.".to_string(), "Done.".to_string()]
    );

    // Exactly one tool embed, transitioned in place to the completed form.
    let tools = gateway.embeds_titled("📖 Reading: /tmp/x.py");
    assert_eq!(tools.len(), 1);
    let embed = tools[0].message.embed.as_ref().unwrap();
    assert!(embed.description.as_deref().unwrap().contains("print('hi')"));
    assert!(embed.description.as_deref().unwrap().starts_with("```"));

    assert_eq!(gateway.embeds_titled("✅ Done").len(), 1);
}

#[tokio::test]
async fn repeated_partial_snapshot_yields_no_wire_traffic() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    let partial = json!({
        "type": "assistant",
        "message": {"stop_reason": null, "content": [{"type": "text", "text": "He"}]}
    });
    p.process(event(partial.clone())).await;
    let edits_after_first = gateway.messages_in(THREAD)[0].edit_count;
    p.process(event(partial)).await;

    let messages = gateway.messages_in(THREAD);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message.content.as_deref(), Some("He"));
    // The identical snapshot produced an empty delta and touched nothing.
    assert_eq!(messages[0].edit_count, edits_after_first);
    p.finalize().await;
}

#[tokio::test]
async fn result_text_matching_last_block_is_suppressed() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("dd01")).await;
    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "end_turn",
                     "content": [{"type": "text", "text": "final answer"}]}
    })))
    .await;
    // The terminal repeats the text with trailing whitespace differences.
    p.process(event(json!({
        "type": "result", "subtype": "success", "session_id": "dd01",
        "result": "final answer  \n"
    })))
    .await;
    p.finalize().await;

    assert_eq!(gateway.text_contents(), vec!["final answer".to_string()]);
}

#[tokio::test]
async fn error_result_posts_error_embed_only() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("ee01")).await;
    p.process(event(json!({
        "type": "result", "subtype": "error", "session_id": "ee01",
        "error": "CLI exited with code 2"
    })))
    .await;
    p.finalize().await;

    assert_eq!(gateway.embeds_titled("❌ Error").len(), 1);
    assert!(gateway.embeds_titled("✅ Done").is_empty());
}

#[tokio::test]
async fn timeout_result_posts_actionable_timeout_embed() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(StreamEvent::terminal_error("Timed out after 300 seconds"))
        .await;
    p.finalize().await;

    let timeouts = gateway.embeds_titled("⏱️ Session timed out");
    assert_eq!(timeouts.len(), 1);
    assert!(gateway.embeds_titled("❌ Error").is_empty());
}

#[tokio::test]
async fn thinking_renders_on_complete_events_only() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": null,
                     "content": [{"type": "thinking", "thinking": "partial thought"}]}
    })))
    .await;
    assert!(gateway.embeds_titled("💭 Thinking").is_empty());

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "end_turn",
                     "content": [{"type": "thinking", "thinking": "full thought"}]}
    })))
    .await;
    let thinking = gateway.embeds_titled("💭 Thinking");
    assert_eq!(thinking.len(), 1);
    assert!(thinking[0]
        .message
        .embed
        .as_ref()
        .unwrap()
        .description
        .as_deref()
        .unwrap()
        .contains("full thought"));
    p.finalize().await;
}

#[tokio::test]
async fn redacted_thinking_posts_placeholder() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "end_turn",
                     "content": [{"type": "redacted_thinking", "data": "x"}]}
    })))
    .await;

    assert_eq!(gateway.embeds_titled("🔒 Thinking (redacted)").len(), 1);
    p.finalize().await;
}

#[tokio::test]
async fn ask_question_sets_drain_mode() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(system_event("fa01")).await;
    assert!(!p.should_drain());

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "tool_use", "content": [{
            "type": "tool_use", "id": "t9", "name": "AskUserQuestion",
            "input": {"questions": [{
                "question": "Which auth?",
                "options": [{"label": "JWT"}, {"label": "OAuth2"}]
            }]}
        }]}
    })))
    .await;

    assert!(p.should_drain());
    p.finalize().await;
    let questions = p.take_pending_ask().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].question, "Which auth?");
}

#[tokio::test]
async fn oversized_tool_result_is_truncated_with_suffix() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "tool_use", "content": [{
            "type": "tool_use", "id": "t1", "name": "Bash",
            "input": {"command": "cat big.txt"}
        }]}
    })))
    .await;
    let big = "x".repeat(5000);
    p.process(event(json!({
        "type": "user",
        "message": {"content": [{
            "type": "tool_result", "tool_use_id": "t1", "content": big
        }]}
    })))
    .await;
    p.finalize().await;

    let tool = gateway.embeds_titled("🔧 Running: cat big.txt");
    let desc = tool[0]
        .message
        .embed
        .as_ref()
        .unwrap()
        .description
        .clone()
        .unwrap();
    assert!(desc.contains("... (truncated)"));
    assert!(desc.chars().count() < 3200);
}

#[tokio::test(start_paused = true)]
async fn tool_timer_ticks_then_stops_on_finalize() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "tool_use", "content": [{
            "type": "tool_use", "id": "t1", "name": "Bash",
            "input": {"command": "sleep 60"}
        }]}
    })))
    .await;

    // Let the live timer fire at least once.
    tokio::time::sleep(std::time::Duration::from_secs(21)).await;
    let ticked = gateway.embeds_titled("🔧 Running: sleep 60...")[0].clone();
    assert!(ticked.edit_count >= 1);
    assert!(ticked
        .message
        .embed
        .as_ref()
        .unwrap()
        .description
        .as_deref()
        .unwrap()
        .contains("elapsed"));
    // The title never changes across ticks.
    assert_eq!(
        ticked.message.embed.as_ref().unwrap().title.as_deref(),
        Some("🔧 Running: sleep 60...")
    );

    p.finalize().await;
    let edits_at_finalize = gateway.embeds_titled("🔧 Running: sleep 60...")[0].edit_count;
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    let edits_later = gateway.embeds_titled("🔧 Running: sleep 60...")[0].edit_count;
    assert_eq!(edits_at_finalize, edits_later);
}

#[tokio::test]
async fn tool_timer_cancelled_when_result_arrives() {
    let gateway = Arc::new(MockGateway::new());
    let mut p = processor(&gateway);

    p.process(event(json!({
        "type": "assistant",
        "message": {"stop_reason": "tool_use", "content": [{
            "type": "tool_use", "id": "t1", "name": "Read",
            "input": {"file_path": "/tmp/a"}
        }]}
    })))
    .await;
    p.process(event(json!({
        "type": "user",
        "message": {"content": [{
            "type": "tool_result", "tool_use_id": "t1", "content": "data"
        }]}
    })))
    .await;

    // Completed embed replaced the in-progress form.
    let tool = gateway.embeds_titled("📖 Reading: /tmp/a");
    assert_eq!(tool.len(), 1);
    assert!(tool[0]
        .message
        .embed
        .as_ref()
        .unwrap()
        .description
        .as_deref()
        .unwrap()
        .contains("data"));
    p.finalize().await;
}
