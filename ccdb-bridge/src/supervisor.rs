//! Per-thread session supervision.
//!
//! Owns admission (a process-wide semaphore), the per-thread run and task
//! registries, interrupt-on-new-message, the stop-button lifecycle, and
//! resume-after-restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ccdb_runner::ClaudeRunner;

use crate::ask::{AnswerBus, AskViewRegistry};
use crate::config::Settings;
use crate::coordination::CoordinationService;
use crate::db::{
    LoungeRepository, PendingAskRepository, PendingResumeRepository, SessionRepository,
};
use crate::gateway::{Gateway, MessageRef, OutboundMessage};
use crate::processor::RunConfig;
use crate::registry::SessionRegistry;
use crate::runs::{ActiveRuns, run_claude_with_config};
use crate::ui::embeds::relay_received_embed;
use crate::ui::status::{StallCallback, StatusManager};
use crate::ui::stop::StopControl;

const DEFAULT_RESUME_PROMPT: &str =
    "The bot has restarted. Please review the previous work and finish anything left incomplete.";

/// Everything the supervisor needs at construction time.
pub struct SupervisorDeps {
    pub gateway: Arc<dyn Gateway>,
    pub settings: Arc<Settings>,
    pub base_runner: Arc<ClaudeRunner>,
    pub registry: Arc<SessionRegistry>,
    pub sessions: SessionRepository,
    pub ask_repo: PendingAskRepository,
    pub resume_repo: PendingResumeRepository,
    pub lounge_repo: Option<LoungeRepository>,
    pub bus: Arc<AnswerBus>,
    pub ask_views: Arc<AskViewRegistry>,
    pub coordination: CoordinationService,
}

/// Supervises Claude Code conversations across Discord threads.
pub struct ChatSupervisor {
    gateway: Arc<dyn Gateway>,
    settings: Arc<Settings>,
    base_runner: Arc<ClaudeRunner>,
    semaphore: Arc<Semaphore>,
    runs: Arc<ActiveRuns>,
    active_tasks: Mutex<HashMap<i64, JoinHandle<()>>>,
    registry: Arc<SessionRegistry>,
    sessions: SessionRepository,
    ask_repo: PendingAskRepository,
    resume_repo: PendingResumeRepository,
    lounge_repo: Option<LoungeRepository>,
    bus: Arc<AnswerBus>,
    ask_views: Arc<AskViewRegistry>,
    coordination: CoordinationService,
}

impl ChatSupervisor {
    pub fn new(deps: SupervisorDeps) -> Arc<Self> {
        let max_concurrent = deps.settings.claude.max_concurrent_sessions.max(1);
        Arc::new(Self {
            gateway: deps.gateway,
            settings: deps.settings,
            base_runner: deps.base_runner,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            runs: Arc::new(ActiveRuns::new()),
            active_tasks: Mutex::new(HashMap::new()),
            registry: deps.registry,
            sessions: deps.sessions,
            ask_repo: deps.ask_repo,
            resume_repo: deps.resume_repo,
            lounge_repo: deps.lounge_repo,
            bus: deps.bus,
            ask_views: deps.ask_views,
            coordination: deps.coordination,
        })
    }

    pub fn runs(&self) -> &Arc<ActiveRuns> {
        &self.runs
    }

    pub fn bus(&self) -> &Arc<AnswerBus> {
        &self.bus
    }

    pub fn ask_views(&self) -> &Arc<AskViewRegistry> {
        &self.ask_views
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    /// Number of runs currently streaming.
    pub fn active_session_count(&self) -> usize {
        self.runs.len()
    }

    /// A message in the watched channel: create a thread and start a run.
    pub async fn on_channel_message(
        self: &Arc<Self>,
        message_id: i64,
        prompt: String,
        thread_name: &str,
    ) {
        let channel_id = self.settings.discord.channel_id;
        let user_message = MessageRef {
            channel_id,
            message_id,
        };
        let name = if thread_name.is_empty() {
            "Claude Chat"
        } else {
            thread_name
        };
        let thread_id = match self
            .gateway
            .create_thread(channel_id, name, Some(user_message))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to create thread for message {message_id}: {e}");
                return;
            },
        };
        self.launch(thread_id, user_message, prompt, None).await;
    }

    /// A reply inside an existing thread: interrupt any current run, wait
    /// for its cleanup, then continue the persisted session.
    pub async fn on_thread_message(self: &Arc<Self>, thread_id: i64, message_id: i64, prompt: String) {
        if let Some(entry) = self.runs.get(thread_id) {
            let _ = self
                .gateway
                .send_message(
                    thread_id,
                    OutboundMessage::text(
                        "⚡ Interrupted the current run — your new message takes over.",
                    ),
                )
                .await;
            entry.runner.interrupt().await;
        }

        // If the thread is instead parked on an interactive question, drop
        // its waiter so the old task winds down instead of holding the new
        // turn hostage for the ask timeout.
        self.bus.unregister(thread_id);

        // The previous task must fully clean up (stop button, registries)
        // before the new turn starts, so it sees a clean slot.
        let previous = self.active_tasks.lock().await.remove(&thread_id);
        if let Some(task) = previous {
            let _ = task.await;
        }

        let session_id = match self.sessions.get(thread_id).await {
            Ok(record) => record.map(|r| r.session_id),
            Err(e) => {
                warn!("Failed to look up session for thread {thread_id}: {e}");
                None
            },
        };

        let user_message = MessageRef {
            channel_id: thread_id,
            message_id,
        };
        self.launch(thread_id, user_message, prompt, session_id).await;
    }

    /// Start a run in an existing thread without a triggering user message
    /// (skill invocations, programmatic spawns). A seed message carrying
    /// the prompt is posted first so the status reactions have an anchor.
    pub async fn spawn_in_thread(self: &Arc<Self>, thread_id: i64, prompt: String) {
        let seed = match self
            .gateway
            .send_message(thread_id, OutboundMessage::text(prompt.clone()))
            .await
        {
            Ok(seed) => seed,
            Err(e) => {
                warn!("Failed to seed thread {thread_id} for spawn: {e}");
                return;
            },
        };
        self.launch(thread_id, seed, prompt, None).await;
    }

    /// Relay a message from one thread into another thread's session.
    ///
    /// Posts an attribution embed in the target (which doubles as the
    /// status anchor), then re-enters the normal thread-message path so an
    /// active run in the target is interrupted and its session resumed
    /// with the relayed prompt. Returns false when the target thread is
    /// unreachable.
    pub async fn relay_message(
        self: &Arc<Self>,
        target_thread: i64,
        source_thread: i64,
        source_name: &str,
        message: &str,
    ) -> bool {
        let seed = match self
            .gateway
            .send_message(
                target_thread,
                OutboundMessage::embed(relay_received_embed(source_thread, message)),
            )
            .await
        {
            Ok(seed) => seed,
            Err(e) => {
                warn!("Failed to post relay attribution in thread {target_thread}: {e}");
                return false;
            },
        };

        // The prefix tells the model the message came from another session.
        let prompt = format!("[Relayed from #{source_name}]\n\n{message}");
        self.on_thread_message(target_thread, seed.message_id, prompt)
            .await;
        true
    }

    /// Spawn one run as a background task, tracked per thread.
    async fn launch(
        self: &Arc<Self>,
        thread_id: i64,
        user_message: MessageRef,
        prompt: String,
        session_id: Option<String>,
    ) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.run_session(thread_id, user_message, prompt, session_id)
                .await;
        });
        self.active_tasks.lock().await.insert(thread_id, handle);
    }

    async fn run_session(
        self: Arc<Self>,
        thread_id: i64,
        user_message: MessageRef,
        prompt: String,
        session_id: Option<String>,
    ) {
        if self.semaphore.available_permits() == 0 {
            let _ = self
                .gateway
                .send_message(
                    thread_id,
                    OutboundMessage::text(format!(
                        "⏳ Waiting for a free session slot... ({} max sessions running)",
                        self.settings.claude.max_concurrent_sessions
                    )),
                )
                .await;
        }
        let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
            return;
        };

        let status = match self.settings.discord.owner_id {
            Some(owner) => {
                // Ping the owner once per hard-stall episode.
                let gateway = self.gateway.clone();
                let callback: StallCallback = Arc::new(move || {
                    let gateway = gateway.clone();
                    let ping: futures::future::BoxFuture<'static, ()> = Box::pin(async move {
                        let _ = gateway
                            .send_message(
                                thread_id,
                                OutboundMessage::text(format!(
                                    "<@{owner}> the session looks stalled — still waiting on the CLI."
                                )),
                            )
                            .await;
                    });
                    ping
                });
                StatusManager::with_stall_callback(
                    self.gateway.clone(),
                    user_message,
                    Some(callback),
                )
            },
            None => StatusManager::new(self.gateway.clone(), user_message),
        };
        status.set_thinking().await;

        let stop = Arc::new(StopControl::new(self.gateway.clone(), thread_id));
        stop.deploy().await;

        let config = RunConfig {
            thread_id,
            gateway: self.gateway.clone(),
            runner: self.base_runner.clone(),
            prompt,
            session_id,
            sessions: Some(self.sessions.clone()),
            status: Some(status.clone()),
            registry: Some(self.registry.clone()),
            ask_repo: Some(self.ask_repo.clone()),
            lounge_repo: self.lounge_repo.clone(),
            bus: Some(self.bus.clone()),
            ask_views: Some(self.ask_views.clone()),
            stop: Some(stop.clone()),
            context_window: Some(self.settings.claude.context_window),
        };

        run_claude_with_config(config, Some(self.runs.clone())).await;

        // Interrupted runs end without a terminal event, leaving the status
        // reaction and its stall monitor behind; cleanup is idempotent.
        status.cleanup().await;
        stop.disable().await;
        self.coordination.post_session_end(thread_id).await;
        self.active_tasks.lock().await.remove(&thread_id);
        drop(permit);
    }

    /// Interrupt the active run in a thread, preserving the session.
    /// Returns false when nothing is running there.
    pub async fn interrupt_thread(&self, thread_id: i64) -> bool {
        match self.runs.get(thread_id) {
            Some(entry) => {
                entry.runner.interrupt().await;
                true
            },
            None => false,
        }
    }

    /// Kill any active run and delete the session mapping so the next
    /// message starts fresh. Returns whether a mapping existed.
    pub async fn clear_thread(&self, thread_id: i64) -> bool {
        if let Some(entry) = self.runs.get(thread_id) {
            entry.runner.kill().await;
            self.runs.remove(thread_id);
        }
        match self.sessions.delete(thread_id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Failed to clear session for thread {thread_id}: {e}");
                false
            },
        }
    }

    /// Resume sessions that marked themselves before a restart.
    ///
    /// Each row is deleted *before* its run spawns, so even a crash during
    /// spawn cannot double-resume; rows outside the TTL window were already
    /// pruned by the repository.
    pub async fn resume_pending(self: &Arc<Self>) {
        let pending = match self.resume_repo.get_pending().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to read pending resumes: {e}");
                return;
            },
        };
        if pending.is_empty() {
            return;
        }

        info!("Found {} pending session resume(s) on startup", pending.len());
        for entry in pending {
            if let Err(e) = self.resume_repo.delete(entry.id).await {
                warn!("Failed to delete pending resume {}: {e}", entry.id);
                continue;
            }

            let prompt = entry
                .resume_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_RESUME_PROMPT.to_string());

            let seed = match self
                .gateway
                .send_message(
                    entry.thread_id,
                    OutboundMessage::text(format!("🔄 **Bot resumed after restart.**\n{prompt}")),
                )
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        "Pending resume: thread {} unreachable, skipping: {e}",
                        entry.thread_id
                    );
                    continue;
                },
            };

            info!(
                "Resuming session in thread {} (session_id={:?}, reason={})",
                entry.thread_id, entry.session_id, entry.reason
            );
            self.launch(entry.thread_id, seed, prompt, entry.session_id.clone())
                .await;
        }
    }

    /// Startup housekeeping: TTL sweeps plus a note about stale ask UIs
    /// (their clicks resolve to a graceful "session has ended" reply).
    pub async fn startup_cleanup(&self) {
        match self.sessions.cleanup_old(30).await {
            Ok(n) if n > 0 => info!("Cleaned up {n} old session(s)"),
            Ok(_) => {},
            Err(e) => warn!("Session cleanup failed: {e}"),
        }
        match self.ask_repo.cleanup_old(48).await {
            Ok(n) if n > 0 => info!("Pruned {n} stale pending ask(s)"),
            Ok(_) => {},
            Err(e) => warn!("Pending-ask cleanup failed: {e}"),
        }
        if let Ok(rows) = self.ask_repo.list_all().await
            && !rows.is_empty()
        {
            info!(
                "{} pending ask(s) survive from before the restart; their buttons will answer gracefully",
                rows.len()
            );
        }
    }
}
