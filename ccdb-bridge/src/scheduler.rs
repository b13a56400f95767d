//! Periodic task scheduler.
//!
//! Tasks live in the tasks DB and are registered via the REST API. A single
//! master loop wakes every 30 seconds, advances each due task's next-run
//! time *before* spawning it (so a second tick inside the interval cannot
//! double-fire), and runs the execution as an independent background task
//! tracked in an in-flight set. The same loop delivers due scheduled
//! notifications.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ccdb_runner::ClaudeRunner;

use crate::db::{NotificationRepository, TaskRecord, TaskRepository, epoch_now};
use crate::gateway::{Embed, Gateway, MessageRef, OutboundMessage};
use crate::processor::RunConfig;
use crate::registry::SessionRegistry;
use crate::runs::run_claude_with_config;

/// How often the master loop wakes up to check for due work.
pub const MASTER_LOOP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Scheduler {
    gateway: Arc<dyn Gateway>,
    tasks: TaskRepository,
    notifications: NotificationRepository,
    base_runner: Arc<ClaudeRunner>,
    registry: Arc<SessionRegistry>,
    context_window: Option<i64>,
    /// Task ids currently executing, to avoid double-running one task.
    running: Mutex<HashSet<i64>>,
}

impl Scheduler {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        tasks: TaskRepository,
        notifications: NotificationRepository,
        base_runner: Arc<ClaudeRunner>,
        registry: Arc<SessionRegistry>,
        context_window: Option<i64>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            tasks,
            notifications,
            base_runner,
            registry,
            context_window,
            running: Mutex::new(HashSet::new()),
        })
    }

    /// Start the master loop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        info!("Scheduler master loop started");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(MASTER_LOOP_INTERVAL).await;
                self.tick().await;
            }
        })
    }

    /// One master-loop iteration. Public so tests can drive it directly.
    pub async fn tick(self: &Arc<Self>) {
        self.dispatch_due_tasks().await;
        self.deliver_due_notifications().await;
    }

    async fn dispatch_due_tasks(self: &Arc<Self>) {
        let due = match self.tasks.get_due(epoch_now()).await {
            Ok(due) => due,
            Err(e) => {
                warn!("Failed to query due tasks: {e}");
                return;
            },
        };
        if due.is_empty() {
            return;
        }

        info!("Scheduler: {} task(s) due", due.len());
        for task in due {
            if self.running.lock().contains(&task.id) {
                continue;
            }

            // Advance next_run_at first; re-fires inside one interval are
            // impossible even if this loop ticks again immediately.
            if let Err(e) = self
                .tasks
                .update_next_run(task.id, task.interval_seconds)
                .await
            {
                warn!("Failed to advance task {}: {e}", task.id);
                continue;
            }

            self.running.lock().insert(task.id);
            let this = self.clone();
            tokio::spawn(async move {
                this.run_task(&task).await;
                this.running.lock().remove(&task.id);
            });
        }
    }

    /// Execute one scheduled task in a fresh Discord thread.
    ///
    /// Scheduled runs are fire-and-forget: no session persistence, no stop
    /// button, no status reactions.
    async fn run_task(self: &Arc<Self>, task: &TaskRecord) {
        // The announcement message makes the thread visible in the channel
        // timeline; a bare thread would only show in the threads panel.
        let starter = match self
            .gateway
            .send_message(
                task.channel_id,
                OutboundMessage::text(format!("🔄 **[Scheduled]** `{}`", task.name)),
            )
            .await
        {
            Ok(message) => message,
            Err(e) => {
                error!(
                    "Scheduler: channel {} unreachable for task {} ({}): {e}",
                    task.channel_id, task.id, task.name
                );
                return;
            },
        };

        let thread_id = match self
            .gateway
            .create_thread(
                task.channel_id,
                &format!("[Scheduled] {}", task.name),
                Some(MessageRef {
                    channel_id: task.channel_id,
                    message_id: starter.message_id,
                }),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Scheduler: failed to create thread for task {}: {e}", task.id);
                return;
            },
        };

        let mut options = self.base_runner.options().clone();
        if let Some(dir) = &task.working_dir {
            options.working_dir = Some(dir.clone());
        }
        let runner = Arc::new(ClaudeRunner::new(options));

        let mut config = RunConfig::new(thread_id, self.gateway.clone(), runner, &task.prompt);
        config.registry = Some(self.registry.clone());
        config.context_window = self.context_window;

        run_claude_with_config(config, None).await;
        info!("Scheduler: task {} ({}) finished", task.id, task.name);
    }

    async fn deliver_due_notifications(&self) {
        let now = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let due = match self.notifications.get_pending(Some(&now)).await {
            Ok(due) => due,
            Err(e) => {
                warn!("Failed to query due notifications: {e}");
                return;
            },
        };

        for notification in due {
            let Some(channel_id) = notification.channel_id else {
                let _ = self
                    .notifications
                    .mark_failed(notification.id, "no channel configured")
                    .await;
                continue;
            };

            let embed = Embed::new()
                .title(notification.title.clone().unwrap_or_else(|| "Notification".into()))
                .description(notification.message.clone())
                .color(notification.color as u32);

            match self
                .gateway
                .send_message(channel_id, OutboundMessage::embed(embed))
                .await
            {
                Ok(_) => {
                    let _ = self.notifications.mark_sent(notification.id).await;
                },
                Err(e) => {
                    warn!("Failed to deliver notification {}: {e}", notification.id);
                    let _ = self
                        .notifications
                        .mark_failed(notification.id, &e.to_string())
                        .await;
                },
            }
        }
    }
}
