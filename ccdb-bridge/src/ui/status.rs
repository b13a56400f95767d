//! Emoji reaction status manager.
//!
//! Shows the agent's state as a single reaction on the triggering user
//! message. Transitions are debounced to stay inside Discord rate limits,
//! and a background stall monitor upgrades the emoji when no activity has
//! been seen for a while.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use ccdb_runner::ToolCategory;

use crate::gateway::{Gateway, MessageRef};

pub const EMOJI_THINKING: &str = "🧠";
pub const EMOJI_TOOL: &str = "🛠️";
pub const EMOJI_CODING: &str = "💻";
pub const EMOJI_WEB: &str = "🌐";
pub const EMOJI_DONE: &str = "✅";
pub const EMOJI_ERROR: &str = "❌";
pub const EMOJI_STALL_SOFT: &str = "⏳";
pub const EMOJI_STALL_HARD: &str = "⚠️";

/// Minimum time between reaction transitions on the wire.
pub const DEBOUNCE: Duration = Duration::from_millis(700);
const STALL_POLL: Duration = Duration::from_secs(2);
const STALL_SOFT: Duration = Duration::from_secs(10);
const STALL_HARD: Duration = Duration::from_secs(30);
const DONE_HOLD: Duration = Duration::from_millis(1500);
const ERROR_HOLD: Duration = Duration::from_millis(2500);

/// Fired once per hard-stall episode.
pub type StallCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub fn category_emoji(category: ToolCategory) -> &'static str {
    match category {
        ToolCategory::Read => EMOJI_TOOL,
        ToolCategory::Edit | ToolCategory::Command => EMOJI_CODING,
        ToolCategory::Web => EMOJI_WEB,
        ToolCategory::Think => EMOJI_THINKING,
        ToolCategory::Ask | ToolCategory::Other => EMOJI_TOOL,
    }
}

struct StatusState {
    current: Option<String>,
    target: Option<String>,
    debounce_task: Option<JoinHandle<()>>,
    stall_task: Option<JoinHandle<()>>,
    last_activity: tokio::time::Instant,
    hard_stall_notified: bool,
}

struct StatusInner {
    gateway: Arc<dyn Gateway>,
    message: MessageRef,
    state: Mutex<StatusState>,
    /// Serializes reaction swaps so two debounced applies cannot interleave.
    apply_lock: Mutex<()>,
    on_hard_stall: Option<StallCallback>,
}

/// Manages the status reaction on one Discord message.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct StatusManager {
    inner: Arc<StatusInner>,
}

impl StatusManager {
    pub fn new(gateway: Arc<dyn Gateway>, message: MessageRef) -> Self {
        Self::with_stall_callback(gateway, message, None)
    }

    pub fn with_stall_callback(
        gateway: Arc<dyn Gateway>,
        message: MessageRef,
        on_hard_stall: Option<StallCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(StatusInner {
                gateway,
                message,
                state: Mutex::new(StatusState {
                    current: None,
                    target: None,
                    debounce_task: None,
                    stall_task: None,
                    last_activity: tokio::time::Instant::now(),
                    hard_stall_notified: false,
                }),
                apply_lock: Mutex::new(()),
                on_hard_stall,
            }),
        }
    }

    pub async fn set_thinking(&self) {
        set_status(self.inner.clone(), EMOJI_THINKING).await;
        self.start_stall_timer().await;
    }

    pub async fn set_tool(&self, category: ToolCategory) {
        set_status(self.inner.clone(), category_emoji(category)).await;
        let mut state = self.inner.state.lock().await;
        state.last_activity = tokio::time::Instant::now();
        state.hard_stall_notified = false;
    }

    pub async fn set_done(&self) {
        self.cancel_stall_timer().await;
        set_status(self.inner.clone(), EMOJI_DONE).await;
        tokio::time::sleep(DONE_HOLD).await;
        self.cleanup().await;
    }

    pub async fn set_error(&self) {
        self.cancel_stall_timer().await;
        set_status(self.inner.clone(), EMOJI_ERROR).await;
        tokio::time::sleep(ERROR_HOLD).await;
        self.cleanup().await;
    }

    /// Remove the status reaction and stop all background tasks.
    pub async fn cleanup(&self) {
        self.cancel_stall_timer().await;
        let current = {
            let mut state = self.inner.state.lock().await;
            if let Some(task) = state.debounce_task.take() {
                task.abort();
            }
            state.current.take()
        };
        if let Some(emoji) = current {
            let _ = self
                .inner
                .gateway
                .remove_reaction(self.inner.message, &emoji)
                .await;
        }
    }

    async fn start_stall_timer(&self) {
        let inner = self.inner.clone();
        let mut state = self.inner.state.lock().await;
        if let Some(task) = state.stall_task.take() {
            task.abort();
        }
        state.last_activity = tokio::time::Instant::now();
        state.stall_task = Some(tokio::spawn(stall_monitor(inner)));
    }

    async fn cancel_stall_timer(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(task) = state.stall_task.take() {
            task.abort();
        }
    }
}

/// Record the new target emoji and (re)arm the debounced apply.
async fn set_status(inner: Arc<StatusInner>, emoji: &str) {
    let mut state = inner.state.lock().await;
    state.target = Some(emoji.to_string());
    if let Some(task) = state.debounce_task.take() {
        task.abort();
    }
    let task_inner = inner.clone();
    state.debounce_task = Some(tokio::spawn(apply_debounced(task_inner)));
}

async fn apply_debounced(inner: Arc<StatusInner>) {
    tokio::time::sleep(DEBOUNCE).await;

    let _guard = inner.apply_lock.lock().await;
    let (current, target) = {
        let state = inner.state.lock().await;
        (state.current.clone(), state.target.clone())
    };
    if current == target {
        return;
    }

    if let Some(old) = &current {
        let _ = inner.gateway.remove_reaction(inner.message, old).await;
    }
    if let Some(new) = &target {
        let _ = inner.gateway.add_reaction(inner.message, new).await;
    }

    inner.state.lock().await.current = target;
}

/// Upgrade the emoji after periods of inactivity: ⏳ once past the soft
/// threshold, ⚠️ past the hard threshold (with the callback fired once per
/// hard-stall episode).
async fn stall_monitor(inner: Arc<StatusInner>) {
    let mut soft_warned = false;
    loop {
        tokio::time::sleep(STALL_POLL).await;
        let (elapsed, current) = {
            let state = inner.state.lock().await;
            (state.last_activity.elapsed(), state.current.clone())
        };

        if elapsed >= STALL_HARD && current.as_deref() != Some(EMOJI_STALL_HARD) {
            set_status(inner.clone(), EMOJI_STALL_HARD).await;
            let notify = {
                let mut state = inner.state.lock().await;
                if state.hard_stall_notified {
                    false
                } else {
                    state.hard_stall_notified = true;
                    true
                }
            };
            if notify && let Some(callback) = &inner.on_hard_stall {
                callback().await;
            }
        } else if elapsed >= STALL_SOFT
            && !soft_warned
            && current.as_deref() != Some(EMOJI_STALL_HARD)
        {
            set_status(inner.clone(), EMOJI_STALL_SOFT).await;
            soft_warned = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    fn status(gateway: &Arc<MockGateway>) -> StatusManager {
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        StatusManager::new(
            dyn_gateway,
            MessageRef {
                channel_id: 1,
                message_id: 10,
            },
        )
    }

    #[test]
    fn test_category_emoji_mapping() {
        assert_eq!(category_emoji(ToolCategory::Read), EMOJI_TOOL);
        assert_eq!(category_emoji(ToolCategory::Edit), EMOJI_CODING);
        assert_eq!(category_emoji(ToolCategory::Command), EMOJI_CODING);
        assert_eq!(category_emoji(ToolCategory::Web), EMOJI_WEB);
        assert_eq!(category_emoji(ToolCategory::Other), EMOJI_TOOL);
    }

    #[tokio::test]
    async fn test_rapid_transitions_coalesce_to_one_reaction() {
        let gateway = Arc::new(MockGateway::new());
        let s = status(&gateway);
        s.set_thinking().await;
        s.set_tool(ToolCategory::Command).await;
        tokio::time::sleep(DEBOUNCE + Duration::from_millis(300)).await;
        let reactions = gateway.reactions.lock().clone();
        let adds: Vec<_> = reactions.iter().filter(|(_, _, added)| *added).collect();
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].1, EMOJI_CODING);
        s.cleanup().await;
    }

    #[tokio::test]
    async fn test_cleanup_removes_current_reaction() {
        let gateway = Arc::new(MockGateway::new());
        let s = status(&gateway);
        s.set_thinking().await;
        tokio::time::sleep(DEBOUNCE + Duration::from_millis(300)).await;
        s.cleanup().await;
        let reactions = gateway.reactions.lock().clone();
        assert!(
            reactions
                .iter()
                .any(|(_, emoji, added)| !added && emoji == EMOJI_THINKING)
        );
    }
}
