//! The run pipeline: clone the runner for one turn, stream events through
//! the processor, and handle the interactive-ask resume loop.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use ccdb_runner::ClaudeRunner;

use crate::ask::collect_ask_answers;
use crate::lounge::build_lounge_prompt;
use crate::processor::{EventProcessor, RunConfig};
use crate::ui::embeds::error_embed;
use crate::ui::stop::StopControl;

/// One live run, reachable by thread id for interrupts.
#[derive(Clone)]
pub struct RunEntry {
    pub runner: Arc<ClaudeRunner>,
    pub stop: Option<Arc<StopControl>>,
}

/// thread id → the runner currently streaming for that thread.
///
/// The entry always points at the clone that actually owns the subprocess,
/// so stop-button clicks and new-message interrupts reach a live process.
#[derive(Default)]
pub struct ActiveRuns {
    inner: Mutex<HashMap<i64, RunEntry>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, thread_id: i64, entry: RunEntry) {
        self.inner.lock().insert(thread_id, entry);
    }

    pub fn remove(&self, thread_id: i64) {
        self.inner.lock().remove(&thread_id);
    }

    pub fn get(&self, thread_id: i64) -> Option<RunEntry> {
        self.inner.lock().get(&thread_id).cloned()
    }

    pub fn contains(&self, thread_id: i64) -> bool {
        self.inner.lock().contains_key(&thread_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Build the ephemeral system context: lounge block plus concurrency
/// notice. Injected via `--append-system-prompt` rather than the user
/// prompt so it never accumulates in session history.
async fn build_system_context(config: &RunConfig) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(lounge) = &config.lounge_repo {
        match lounge.get_recent(10).await {
            Ok(recent) => {
                debug!("Lounge context built ({} recent message(s))", recent.len());
                parts.push(build_lounge_prompt(&recent));
            },
            Err(e) => warn!("Failed to fetch lounge context, skipping: {e}"),
        }
    }

    if let Some(registry) = &config.registry {
        let description: String = config.prompt.chars().take(100).collect();
        registry.register(
            config.thread_id,
            &description.replace('\n', " "),
            config.runner.options().working_dir.clone(),
        );
        parts.push(registry.build_concurrency_notice(config.thread_id));
        info!(
            "Concurrency notice built for thread {} ({} other active session(s))",
            config.thread_id,
            registry.list_others(config.thread_id).len()
        );
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Execute the CLI and stream results into the run's thread.
///
/// Drives as many turns as the interactive-ask flow requires: when a run
/// ends with a pending ask and the user answers, the answer becomes the
/// next prompt against the same session id.
///
/// Returns the final session id, or `None` if no run produced one.
pub async fn run_claude_with_config(
    mut config: RunConfig,
    runs: Option<Arc<ActiveRuns>>,
) -> Option<String> {
    loop {
        let outcome = run_one_turn(&config, runs.as_ref()).await;

        // Only an ask that also produced a session id can continue; there
        // is nothing to resume into otherwise.
        let (Some(questions), Some(sid)) = (outcome.pending_ask, outcome.session_id.clone())
        else {
            return outcome.session_id;
        };
        let (Some(bus), Some(views)) = (config.bus.clone(), config.ask_views.clone()) else {
            return outcome.session_id;
        };

        let answer = collect_ask_answers(
            &config.gateway,
            &bus,
            &views,
            config.thread_id,
            &questions,
            &sid,
            config.ask_repo.as_ref(),
        )
        .await;

        match answer {
            Some(prompt) => {
                info!("Resuming session {sid} after interactive answer");
                config = config.with_prompt(prompt);
                config.session_id = Some(sid);
            },
            None => return outcome.session_id,
        }
    }
}

struct TurnOutcome {
    session_id: Option<String>,
    pending_ask: Option<Vec<ccdb_runner::AskQuestion>>,
}

async fn run_one_turn(config: &RunConfig, runs: Option<&Arc<ActiveRuns>>) -> TurnOutcome {
    let system_context = build_system_context(config).await;

    // The per-turn clone carries the thread id and the ephemeral context;
    // it is what owns the subprocess, so it is what goes in the registry.
    let runner = Arc::new(
        config
            .runner
            .clone_with(Some(config.thread_id), system_context),
    );
    if let Some(runs) = runs {
        runs.insert(
            config.thread_id,
            RunEntry {
                runner: runner.clone(),
                stop: config.stop.clone(),
            },
        );
    }

    let mut turn_config = config.clone();
    turn_config.runner = runner.clone();
    let mut processor = EventProcessor::new(turn_config);

    let outcome = async {
        let mut events = runner
            .run(&config.prompt, config.session_id.as_deref())
            .await?;
        while let Some(event) = events.next().await {
            if processor.should_drain() {
                continue;
            }
            processor.process(event).await;
        }
        Ok::<_, crate::errors::BridgeError>(())
    }
    .await;

    processor.finalize().await;
    let pending_ask = processor.take_pending_ask();
    let session_id = processor.session_id().map(String::from);

    if let Some(registry) = &config.registry {
        registry.unregister(config.thread_id);
    }
    if let Some(runs) = runs {
        runs.remove(config.thread_id);
    }

    if let Err(e) = outcome {
        error!("Error running Claude CLI for thread {}: {e}", config.thread_id);
        // The connection may be down too; both follow-ups are best-effort.
        let _ = config
            .gateway
            .send_message(
                config.thread_id,
                crate::gateway::OutboundMessage::embed(error_embed(
                    "An unexpected error occurred.",
                )),
            )
            .await;
        if let Some(status) = &config.status {
            status.set_error().await;
        }
    }

    TurnOutcome {
        session_id,
        pending_ask,
    }
}
