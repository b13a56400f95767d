//! Event processor: the state machine that turns stream events into
//! Discord side-effects.
//!
//! One instance per run. Call [`EventProcessor::process`] for each event
//! from the runner and [`EventProcessor::finalize`] on the way out.
//!
//! Guards:
//! - `session_start_sent` — the session-start embed fires exactly once per
//!   run even though multiple SYSTEM events arrive (init, hook feedback).
//! - `assistant_text_sent` — the terminal RESULT often repeats the last
//!   assistant text modulo trailing whitespace; the flag (not string
//!   equality) suppresses the duplicate post.
//! - `pending_ask` — set when an interactive question is seen; the caller
//!   drains the rest of the stream and handles the ask afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use ccdb_runner::{AskQuestion, ClaudeRunner, MessageKind, StreamEvent, ToolUse};

use crate::ask::{AnswerBus, AskViewRegistry};
use crate::db::{LoungeRepository, PendingAskRepository, SessionRepository};
use crate::gateway::{Embed, Gateway, MessageRef, OutboundMessage};
use crate::registry::SessionRegistry;
use crate::ui::chunker::chunk_message;
use crate::ui::embeds::{
    make_error_embed, redacted_thinking_embed, session_complete_embed, session_start_embed,
    thinking_embed, tool_result_embed, tool_use_embed,
};
use crate::ui::status::StatusManager;
use crate::ui::stop::StopControl;
use crate::ui::streamer::StreamingMessageManager;
use crate::ui::timer::start_tool_timer;

/// Max characters of tool output shown in the result embed: roughly 30
/// lines of typical output, leaving headroom under the 4096 description
/// limit for the code fence.
pub const TOOL_RESULT_MAX_CHARS: usize = 3000;

/// Truncate tool result content for display.
pub fn truncate_result(content: &str) -> String {
    if content.chars().count() <= TOOL_RESULT_MAX_CHARS {
        return content.to_string();
    }
    let truncated: String = content.chars().take(TOOL_RESULT_MAX_CHARS).collect();
    truncated + "\n... (truncated)"
}

/// Everything one run needs: the thread, the runner, the prompt, and the
/// optional collaborators. Treated as a value object — turns derive new
/// configs via [`RunConfig::with_prompt`] instead of mutating.
#[derive(Clone)]
pub struct RunConfig {
    pub thread_id: i64,
    pub gateway: Arc<dyn Gateway>,
    pub runner: Arc<ClaudeRunner>,
    pub prompt: String,
    /// Session id to resume; `None` starts a fresh session.
    pub session_id: Option<String>,
    /// Session persistence; `None` for fire-and-forget runs.
    pub sessions: Option<SessionRepository>,
    pub status: Option<StatusManager>,
    pub registry: Option<Arc<SessionRegistry>>,
    pub ask_repo: Option<PendingAskRepository>,
    pub lounge_repo: Option<LoungeRepository>,
    pub bus: Option<Arc<AnswerBus>>,
    pub ask_views: Option<Arc<AskViewRegistry>>,
    pub stop: Option<Arc<StopControl>>,
    pub context_window: Option<i64>,
}

impl RunConfig {
    /// Minimal config; optional collaborators start unset.
    pub fn new(
        thread_id: i64,
        gateway: Arc<dyn Gateway>,
        runner: Arc<ClaudeRunner>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            thread_id,
            gateway,
            runner,
            prompt: prompt.into(),
            session_id: None,
            sessions: None,
            status: None,
            registry: None,
            ask_repo: None,
            lounge_repo: None,
            bus: None,
            ask_views: None,
            stop: None,
            context_window: None,
        }
    }

    /// A copy of this config carrying a different prompt.
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        let mut config = self.clone();
        config.prompt = prompt.into();
        config
    }
}

/// Processes stream events and dispatches Discord actions for one run.
pub struct EventProcessor {
    config: RunConfig,
    session_id: Option<String>,
    streamer: StreamingMessageManager,
    /// Last partial snapshot, so deltas can be computed.
    partial_text: String,
    /// tool id → (embed message, embed title)
    active_tools: HashMap<String, (MessageRef, String)>,
    active_timers: HashMap<String, JoinHandle<()>>,
    session_start_sent: bool,
    assistant_text_sent: bool,
    pending_ask: Option<Vec<AskQuestion>>,
}

impl EventProcessor {
    pub fn new(config: RunConfig) -> Self {
        let streamer = StreamingMessageManager::new(config.gateway.clone(), config.thread_id);
        let session_id = config.session_id.clone();
        Self {
            config,
            session_id,
            streamer,
            partial_text: String::new(),
            active_tools: HashMap::new(),
            active_timers: HashMap::new(),
            session_start_sent: false,
            assistant_text_sent: false,
            pending_ask: None,
        }
    }

    /// The current session id, updated as SYSTEM/RESULT events arrive.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The questions of a detected interactive ask, if any.
    pub fn take_pending_ask(&mut self) -> Option<Vec<AskQuestion>> {
        self.pending_ask.take()
    }

    /// True while the caller should drain (skip) remaining events.
    pub fn should_drain(&self) -> bool {
        self.pending_ask.is_some()
    }

    /// True once assistant text reached Discord.
    pub fn assistant_text_sent(&self) -> bool {
        self.assistant_text_sent
    }

    /// Dispatch a single stream event.
    pub async fn process(&mut self, event: StreamEvent) {
        match event.kind {
            MessageKind::System => self.on_system(&event).await,
            MessageKind::Assistant => self.on_assistant(&event).await,
            MessageKind::User => self.on_tool_result(&event).await,
            MessageKind::Result => {},
        }

        if event.is_complete {
            self.on_complete(&event).await;
        }
    }

    /// Cancel any live tool timers. Call on every exit path.
    pub async fn finalize(&mut self) {
        for (_, handle) in self.active_timers.drain() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------

    async fn on_system(&mut self, event: &StreamEvent) {
        let Some(session_id) = &event.session_id else {
            return;
        };

        self.session_id = Some(session_id.clone());
        self.persist_session(session_id).await;

        if self.config.session_id.is_none() && !self.session_start_sent {
            self.send_embed(session_start_embed(Some(session_id))).await;
            self.session_start_sent = true;
        }
    }

    async fn on_assistant(&mut self, event: &StreamEvent) {
        // Extended thinking is only rendered on complete events; partials
        // would spam one embed per token batch.
        if let Some(thinking) = &event.thinking
            && !event.is_partial
        {
            self.send_embed(thinking_embed(thinking)).await;
        }

        if event.has_redacted_thinking && !event.is_partial {
            self.send_embed(redacted_thinking_embed()).await;
        }

        if let Some(text) = &event.text {
            self.handle_text(text, event.is_partial).await;
        }

        if let Some(tool) = &event.tool_use {
            self.handle_tool_use(tool).await;
        }

        if !event.ask_questions.is_empty() {
            self.pending_ask = Some(event.ask_questions.clone());
            self.config.runner.interrupt().await;
        }
    }

    async fn on_tool_result(&mut self, event: &StreamEvent) {
        let Some(result_id) = &event.tool_result_id else {
            return;
        };

        if let Some(status) = &self.config.status {
            status.set_thinking().await;
        }

        if let Some(handle) = self.active_timers.remove(result_id) {
            handle.abort();
        }

        if let Some((message, title)) = self.active_tools.get(result_id)
            && let Some(content) = &event.tool_result_content
            && !content.is_empty()
        {
            let embed = tool_result_embed(title, &truncate_result(content));
            if let Err(e) = self
                .config
                .gateway
                .edit_message(*message, OutboundMessage::embed(embed))
                .await
            {
                warn!("Failed to update tool embed: {e}");
            }
        }
    }

    async fn on_complete(&mut self, event: &StreamEvent) {
        if self.streamer.has_content().await {
            self.streamer.finalize().await;
            self.assistant_text_sent = true;
        }

        if let Some(error) = &event.error {
            self.send_embed(make_error_embed(error)).await;
            if let Some(status) = &self.config.status {
                status.set_error().await;
            }
        } else {
            if let Some(text) = &event.text
                && !self.assistant_text_sent
            {
                self.send_chunked(text).await;
            }

            self.send_embed(session_complete_embed(
                event.cost_usd,
                event.duration_ms,
                event.input_tokens,
                event.output_tokens,
                event.cache_read_tokens,
                self.config.context_window,
                event.cache_creation_tokens,
            ))
            .await;

            if let Some(status) = &self.config.status {
                status.set_done().await;
            }
        }

        if let Some(session_id) = &event.session_id {
            self.persist_session(session_id).await;
            self.session_id = Some(session_id.clone());
        }

        // A next turn may follow (ask resume); start from a fresh streamer.
        self.reset_streamer();
    }

    // ------------------------------------------------------------------
    // Text streaming
    // ------------------------------------------------------------------

    async fn handle_text(&mut self, text: &str, is_partial: bool) {
        // Partials carry the full accumulated text; the delta is whatever
        // grew past the previous snapshot.
        let delta = text
            .get(self.partial_text.len()..)
            .unwrap_or_default()
            .to_string();

        if is_partial {
            self.partial_text = text.to_string();
            if !delta.is_empty() {
                self.streamer.append(&delta).await;
            }
            return;
        }

        if self.streamer.has_content().await {
            if !delta.is_empty() {
                self.streamer.append(&delta).await;
            }
            self.streamer.finalize().await;
            self.reset_streamer();
        } else {
            // No partial events arrived; post the full text directly.
            self.send_chunked(text).await;
        }
        self.partial_text.clear();
        self.assistant_text_sent = true;
        self.bump_stop().await;
    }

    async fn handle_tool_use(&mut self, tool: &ToolUse) {
        // Close out any in-flight streaming text before the tool embed.
        if self.streamer.has_content().await {
            self.streamer.finalize().await;
            self.reset_streamer();
        }
        self.partial_text.clear();
        // A tool use opens a new logical text block; whatever text follows
        // (including result text) is no longer a duplicate of the last one.
        self.assistant_text_sent = false;

        if let Some(status) = &self.config.status {
            status.set_tool(tool.category).await;
        }

        let embed = tool_use_embed(tool, true, None);
        let title = embed.title.clone().unwrap_or_default();
        if let Some(message) = self.send_embed(embed).await {
            self.active_tools.insert(tool.id.clone(), (message, title));
            let handle = start_tool_timer(self.config.gateway.clone(), message, tool.clone());
            if let Some(old) = self.active_timers.insert(tool.id.clone(), handle) {
                old.abort();
            }
        }

        self.bump_stop().await;
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn reset_streamer(&mut self) {
        self.streamer =
            StreamingMessageManager::new(self.config.gateway.clone(), self.config.thread_id);
    }

    async fn bump_stop(&self) {
        if let Some(stop) = &self.config.stop {
            stop.bump().await;
        }
    }

    async fn persist_session(&self, session_id: &str) {
        if let Some(repo) = &self.config.sessions
            && let Err(e) = repo.save(self.config.thread_id, session_id).await
        {
            warn!(
                "Failed to persist session {session_id} for thread {}: {e}",
                self.config.thread_id
            );
        }
    }

    async fn send_chunked(&self, text: &str) {
        for chunk in chunk_message(text) {
            self.send(OutboundMessage::text(chunk)).await;
        }
    }

    async fn send_embed(&self, embed: Embed) -> Option<MessageRef> {
        self.send(OutboundMessage::embed(embed)).await
    }

    /// Send into the run's thread; transport errors log and continue.
    async fn send(&self, message: OutboundMessage) -> Option<MessageRef> {
        match self
            .config
            .gateway
            .send_message(self.config.thread_id, message)
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Discord send failed in thread {}: {e}", self.config.thread_id);
                None
            },
        }
    }
}
