//! Stop-button lifecycle.
//!
//! A persistent ⏹ Stop button rides under a short status message in the
//! thread. Clicking it interrupts the active runner (handled by the
//! interaction handler); the control itself tracks the message, keeps the
//! button at the bottom of long threads, and goes inert once stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::gateway::{Button, ButtonKind, ComponentRow, Gateway, MessageRef, OutboundMessage};

const STATUS_LINE: &str = "-# ⏺ Session running";
const CUSTOM_ID_PREFIX: &str = "ccdb:stop:";

/// The stop control for one run.
pub struct StopControl {
    gateway: Arc<dyn Gateway>,
    thread_id: i64,
    message: Mutex<Option<MessageRef>>,
    stopped: AtomicBool,
}

impl StopControl {
    pub fn new(gateway: Arc<dyn Gateway>, thread_id: i64) -> Self {
        Self {
            gateway,
            thread_id,
            message: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Component custom id for this thread's stop button.
    pub fn custom_id(thread_id: i64) -> String {
        format!("{CUSTOM_ID_PREFIX}{thread_id}")
    }

    /// Recover the thread id from a stop-button custom id.
    pub fn parse_custom_id(custom_id: &str) -> Option<i64> {
        custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.parse().ok()
    }

    /// Build the button row.
    pub fn row(thread_id: i64, disabled: bool) -> ComponentRow {
        ComponentRow::Buttons(vec![Button {
            custom_id: Self::custom_id(thread_id),
            label: "⏹ Stop".into(),
            style: ButtonKind::Danger,
            disabled,
        }])
    }

    /// Post the initial status message with the button.
    pub async fn deploy(&self) {
        let message = OutboundMessage::text(STATUS_LINE)
            .with_components(vec![Self::row(self.thread_id, false)]);
        match self.gateway.send_message(self.thread_id, message).await {
            Ok(sent) => *self.message.lock().await = Some(sent),
            Err(e) => debug!("Failed to deploy stop button: {e}"),
        }
    }

    /// Move the button to the bottom of the thread by deleting the old
    /// status message and sending a fresh one. No-op once stopped.
    pub async fn bump(&self) {
        if self.is_stopped() {
            return;
        }
        let old = self.message.lock().await.take();
        if let Some(old) = old
            && let Err(e) = self.gateway.delete_message(old).await
        {
            debug!("Failed to delete old stop message: {e}");
        }
        self.deploy().await;
    }

    /// Flip into the stopped state. Returns true on the first call only.
    pub fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Disable the button after the session ends naturally.
    /// No-op if the stop button was already clicked.
    pub async fn disable(&self) {
        if !self.mark_stopped() {
            return;
        }
        let message = *self.message.lock().await;
        if let Some(message) = message {
            let patch = OutboundMessage::default()
                .with_components(vec![Self::row(self.thread_id, true)]);
            if let Err(e) = self.gateway.edit_message(message, patch).await {
                debug!("Failed to disable stop button: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    fn control(gateway: &Arc<MockGateway>) -> StopControl {
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        StopControl::new(dyn_gateway, 77)
    }

    #[test]
    fn test_custom_id_round_trip() {
        let id = StopControl::custom_id(42);
        assert_eq!(StopControl::parse_custom_id(&id), Some(42));
        assert_eq!(StopControl::parse_custom_id("ccdb:ask:42"), None);
    }

    #[tokio::test]
    async fn test_bump_deletes_and_resends() {
        let gateway = Arc::new(MockGateway::new());
        let c = control(&gateway);
        c.deploy().await;
        let first = gateway.messages_in(77)[0].reference;
        c.bump().await;
        assert_eq!(gateway.deleted.lock().len(), 1);
        let live = gateway.messages_in(77);
        assert_eq!(live.len(), 1);
        assert_ne!(live[0].reference, first);
        assert_eq!(live[0].message.content.as_deref(), Some(STATUS_LINE));
    }

    #[tokio::test]
    async fn test_bump_is_noop_after_stop() {
        let gateway = Arc::new(MockGateway::new());
        let c = control(&gateway);
        c.deploy().await;
        assert!(c.mark_stopped());
        c.bump().await;
        assert!(gateway.deleted.lock().is_empty());
        assert_eq!(gateway.messages_in(77).len(), 1);
    }

    #[tokio::test]
    async fn test_disable_is_idempotent() {
        let gateway = Arc::new(MockGateway::new());
        let c = control(&gateway);
        c.deploy().await;
        c.disable().await;
        c.disable().await;
        let message = &gateway.messages_in(77)[0];
        assert_eq!(message.edit_count, 1);
        match &message.message.components.as_ref().unwrap()[0] {
            ComponentRow::Buttons(buttons) => assert!(buttons[0].disabled),
            other => panic!("unexpected row: {other:?}"),
        }
    }

    #[test]
    fn test_second_mark_stopped_returns_false() {
        let gateway = Arc::new(MockGateway::new());
        let c = control(&gateway);
        assert!(c.mark_stopped());
        assert!(!c.mark_stopped());
    }
}
