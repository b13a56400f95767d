//! Type definitions for Claude Code CLI stream-json output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level message kinds in stream-json output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Session lifecycle messages (init, hook feedback)
    System,
    /// Model output: text, thinking and tool_use blocks
    Assistant,
    /// Tool results echoed back as user turns
    User,
    /// Terminal message closing one run
    Result,
}

impl MessageKind {
    /// Map a wire `type` string onto a kind. Unknown kinds yield `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "assistant" => Some(Self::Assistant),
            "user" => Some(Self::User),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

/// Categories for tool use, used for status emoji and embed icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// File and search reads (Read, Glob, Grep, LS)
    Read,
    /// File mutations (Write, Edit, NotebookEdit)
    Edit,
    /// Shell commands (Bash)
    Command,
    /// Network access (WebFetch, WebSearch)
    Web,
    /// Extended thinking
    Think,
    /// Interactive questions (AskUserQuestion)
    Ask,
    /// Everything else, including Task subagents
    Other,
}

/// Derive the category for a tool by name.
pub fn categorize_tool(name: &str) -> ToolCategory {
    match name {
        "Read" | "Glob" | "Grep" | "LS" => ToolCategory::Read,
        "Write" | "Edit" | "NotebookEdit" => ToolCategory::Edit,
        "Bash" => ToolCategory::Command,
        "WebFetch" | "WebSearch" => ToolCategory::Web,
        "AskUserQuestion" => ToolCategory::Ask,
        _ => ToolCategory::Other,
    }
}

/// Commands longer than this are right-truncated in display names.
const MAX_COMMAND_DISPLAY: usize = 60;

/// A parsed tool_use block.
#[derive(Debug, Clone)]
pub struct ToolUse {
    /// Tool invocation id, matched against later tool_result blocks
    pub id: String,
    /// Tool name as reported by the CLI
    pub name: String,
    /// Raw tool input map
    pub input: Value,
    /// Category derived from the name
    pub category: ToolCategory,
}

impl ToolUse {
    /// Human-readable description of what this tool is doing.
    pub fn display_name(&self) -> String {
        let str_field = |key: &str| {
            self.input
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match self.name.as_str() {
            "Read" => format!(
                "Reading: {}",
                self.input
                    .get("file_path")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ),
            "Write" => format!(
                "Writing: {}",
                self.input
                    .get("file_path")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ),
            "Edit" => format!(
                "Editing: {}",
                self.input
                    .get("file_path")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ),
            "Glob" | "Grep" => {
                let pattern = self
                    .input
                    .get("pattern")
                    .or_else(|| self.input.get("glob"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                format!("Searching: {pattern}")
            },
            "Bash" => {
                let mut cmd = str_field("command");
                if cmd.chars().count() > MAX_COMMAND_DISPLAY {
                    cmd = cmd.chars().take(MAX_COMMAND_DISPLAY - 3).collect::<String>() + "...";
                }
                format!("Running: {cmd}")
            },
            "WebSearch" => format!("Searching web: {}", str_field("query")),
            "WebFetch" => format!("Fetching: {}", str_field("url")),
            "Task" => format!("Spawning agent: {}", str_field("description")),
            other => format!("Using: {other}"),
        }
    }
}

/// One selectable option of an interactive question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOption {
    /// Button / select label
    pub label: String,
    /// Optional longer description
    #[serde(default)]
    pub description: String,
}

/// One interactive question emitted via the AskUserQuestion tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskQuestion {
    /// The question text
    pub question: String,
    /// Short header shown above the question
    #[serde(default)]
    pub header: String,
    /// Whether multiple options may be selected
    #[serde(default)]
    pub multi_select: bool,
    /// Selectable options (options with empty labels are dropped at parse time)
    #[serde(default)]
    pub options: Vec<AskOption>,
}

/// A parsed event from the Claude Code stream-json output.
///
/// Modeled as one record with per-kind optional payloads: the parser fills
/// exactly the fields relevant to the wire message it saw, and downstream
/// consumers dispatch on [`StreamEvent::kind`].
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Top-level message kind
    pub kind: MessageKind,
    /// Session id (SYSTEM and RESULT messages)
    pub session_id: Option<String>,
    /// Accumulated assistant text, or final result text
    pub text: Option<String>,
    /// Extended-thinking text
    pub thinking: Option<String>,
    /// A redacted_thinking block was present
    pub has_redacted_thinking: bool,
    /// Parsed tool_use block
    pub tool_use: Option<ToolUse>,
    /// Interactive questions when the tool is AskUserQuestion
    pub ask_questions: Vec<AskQuestion>,
    /// tool_use id this result answers (USER messages)
    pub tool_result_id: Option<String>,
    /// Extracted tool result text
    pub tool_result_content: Option<String>,
    /// True while `stop_reason` is absent: the text is a growing snapshot
    pub is_partial: bool,
    /// Terminal flag; set exactly once per run
    pub is_complete: bool,
    /// Error description on failed terminal events
    pub error: Option<String>,
    /// Run cost in USD
    pub cost_usd: Option<f64>,
    /// Wall-clock duration of the run
    pub duration_ms: Option<i64>,
    /// Prompt tokens
    pub input_tokens: Option<i64>,
    /// Completion tokens
    pub output_tokens: Option<i64>,
    /// Tokens served from prompt cache
    pub cache_read_tokens: Option<i64>,
    /// Tokens written to prompt cache
    pub cache_creation_tokens: Option<i64>,
}

impl StreamEvent {
    /// Create an empty event of the given kind.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            session_id: None,
            text: None,
            thinking: None,
            has_redacted_thinking: false,
            tool_use: None,
            ask_questions: Vec::new(),
            tool_result_id: None,
            tool_result_content: None,
            is_partial: false,
            is_complete: false,
            error: None,
            cost_usd: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            cache_read_tokens: None,
            cache_creation_tokens: None,
        }
    }

    /// Synthesize a terminal error event (timeouts, non-zero exits).
    pub fn terminal_error(error: impl Into<String>) -> Self {
        let mut event = Self::new(MessageKind::Result);
        event.is_complete = true;
        event.error = Some(error.into());
        event
    }
}

/// Configuration for a [`crate::ClaudeRunner`].
///
/// These are the only knobs the runner exposes; everything else about the
/// CLI invocation is fixed by [`crate::ClaudeRunner::build_args`].
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Binary path or name, passed as argv\[0\]
    pub command: String,
    /// Model alias passed as `--model`
    pub model: String,
    /// Passed as `--permission-mode`
    pub permission_mode: String,
    /// Spawn cwd; the parent's cwd when `None`
    pub working_dir: Option<String>,
    /// Soft deadline; a synthetic timeout RESULT is yielded on expiry
    pub timeout_seconds: u64,
    /// Joined with commas and passed as `--allowedTools` when non-empty
    pub allowed_tools: Vec<String>,
    /// Appends `--dangerously-skip-permissions`
    pub dangerously_skip_permissions: bool,
    /// Appends `--include-partial-messages` (default on)
    pub include_partial_messages: bool,
    /// Injected as `CCDB_API_URL=http://127.0.0.1:<port>`
    pub api_port: Option<u16>,
    /// Injected as `CCDB_API_SECRET`
    pub api_secret: Option<String>,
    /// Injected as `DISCORD_THREAD_ID`
    pub thread_id: Option<i64>,
    /// Passed verbatim via `--append-system-prompt` when non-empty
    pub append_system_prompt: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            model: "sonnet".to_string(),
            permission_mode: "acceptEdits".to_string(),
            working_dir: None,
            timeout_seconds: 300,
            allowed_tools: Vec::new(),
            dangerously_skip_permissions: false,
            include_partial_messages: true,
            api_port: None,
            api_secret: None,
            thread_id: None,
            append_system_prompt: None,
        }
    }
}

impl RunnerOptions {
    /// Create a builder for fluent construction.
    pub fn builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`RunnerOptions`].
#[derive(Debug, Default)]
pub struct RunnerOptionsBuilder {
    options: RunnerOptions,
}

impl RunnerOptionsBuilder {
    /// Set the CLI binary path or name.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.options.command = command.into();
        self
    }

    /// Set the model alias.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = model.into();
        self
    }

    /// Set the permission mode.
    pub fn permission_mode(mut self, mode: impl Into<String>) -> Self {
        self.options.permission_mode = mode.into();
        self
    }

    /// Set the spawn working directory.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.options.working_dir = Some(dir.into());
        self
    }

    /// Set the soft deadline in seconds.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.options.timeout_seconds = seconds;
        self
    }

    /// Set the auto-approved tool list.
    pub fn allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.options.allowed_tools = tools;
        self
    }

    /// Skip all permission prompts (use with caution).
    pub fn dangerously_skip_permissions(mut self, skip: bool) -> Self {
        self.options.dangerously_skip_permissions = skip;
        self
    }

    /// Toggle `--include-partial-messages`.
    pub fn include_partial_messages(mut self, include: bool) -> Self {
        self.options.include_partial_messages = include;
        self
    }

    /// Advertise the embedded HTTP API to the child via `CCDB_API_URL`.
    pub fn api_port(mut self, port: u16) -> Self {
        self.options.api_port = Some(port);
        self
    }

    /// Bearer secret the child should use against the embedded API.
    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.options.api_secret = Some(secret.into());
        self
    }

    /// Discord thread id injected as `DISCORD_THREAD_ID`.
    pub fn thread_id(mut self, thread_id: i64) -> Self {
        self.options.thread_id = Some(thread_id);
        self
    }

    /// Ephemeral system prompt appended to the CLI's own.
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.append_system_prompt = Some(prompt.into());
        self
    }

    /// Finish building.
    pub fn build(self) -> RunnerOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_categorize_tool() {
        assert_eq!(categorize_tool("Read"), ToolCategory::Read);
        assert_eq!(categorize_tool("Glob"), ToolCategory::Read);
        assert_eq!(categorize_tool("Write"), ToolCategory::Edit);
        assert_eq!(categorize_tool("NotebookEdit"), ToolCategory::Edit);
        assert_eq!(categorize_tool("Bash"), ToolCategory::Command);
        assert_eq!(categorize_tool("WebFetch"), ToolCategory::Web);
        assert_eq!(categorize_tool("AskUserQuestion"), ToolCategory::Ask);
        assert_eq!(categorize_tool("Task"), ToolCategory::Other);
        assert_eq!(categorize_tool("SomethingNew"), ToolCategory::Other);
    }

    #[test]
    fn test_display_name_read() {
        let tool = ToolUse {
            id: "t1".into(),
            name: "Read".into(),
            input: json!({"file_path": "/tmp/x.py"}),
            category: ToolCategory::Read,
        };
        assert_eq!(tool.display_name(), "Reading: /tmp/x.py");
    }

    #[test]
    fn test_display_name_truncates_long_commands() {
        let cmd = "x".repeat(100);
        let tool = ToolUse {
            id: "t1".into(),
            name: "Bash".into(),
            input: json!({ "command": cmd }),
            category: ToolCategory::Command,
        };
        let display = tool.display_name();
        assert!(display.starts_with("Running: "));
        assert!(display.ends_with("..."));
        assert_eq!(display.len(), "Running: ".len() + MAX_COMMAND_DISPLAY);
    }

    #[test]
    fn test_display_name_fallback() {
        let tool = ToolUse {
            id: "t1".into(),
            name: "MysteryTool".into(),
            input: json!({}),
            category: ToolCategory::Other,
        };
        assert_eq!(tool.display_name(), "Using: MysteryTool");
    }

    #[test]
    fn test_options_builder_defaults() {
        let options = RunnerOptions::builder().build();
        assert_eq!(options.command, "claude");
        assert_eq!(options.model, "sonnet");
        assert_eq!(options.permission_mode, "acceptEdits");
        assert_eq!(options.timeout_seconds, 300);
        assert!(options.include_partial_messages);
        assert!(!options.dangerously_skip_permissions);
    }

    #[test]
    fn test_options_builder_overrides() {
        let options = RunnerOptions::builder()
            .command("/opt/bin/claude")
            .model("opus")
            .timeout_seconds(60)
            .thread_id(42)
            .api_port(8080)
            .build();
        assert_eq!(options.command, "/opt/bin/claude");
        assert_eq!(options.model, "opus");
        assert_eq!(options.timeout_seconds, 60);
        assert_eq!(options.thread_id, Some(42));
        assert_eq!(options.api_port, Some(8080));
    }

    #[test]
    fn test_ask_question_round_trips_through_json() {
        let q = AskQuestion {
            question: "Which auth?".into(),
            header: "Auth".into(),
            multi_select: false,
            options: vec![
                AskOption {
                    label: "JWT".into(),
                    description: String::new(),
                },
                AskOption {
                    label: "OAuth2".into(),
                    description: "Delegated".into(),
                },
            ],
        };
        let encoded = serde_json::to_string(&q).unwrap();
        let decoded: AskQuestion = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, q);
    }
}
