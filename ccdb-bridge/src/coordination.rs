//! Session lifecycle announcements to the shared coordination channel.
//!
//! A no-op when no coordination channel is configured, so callers never
//! need to guard against the unconfigured case.

use std::sync::Arc;

use tracing::warn;

use crate::gateway::{Gateway, OutboundMessage};

#[derive(Clone)]
pub struct CoordinationService {
    gateway: Arc<dyn Gateway>,
    channel_id: Option<i64>,
}

impl CoordinationService {
    pub fn new(gateway: Arc<dyn Gateway>, channel_id: Option<i64>) -> Self {
        Self {
            gateway,
            channel_id,
        }
    }

    pub fn enabled(&self) -> bool {
        self.channel_id.is_some()
    }

    /// Post a session-ended notice.
    pub async fn post_session_end(&self, thread_id: i64) {
        let Some(channel_id) = self.channel_id else {
            return;
        };
        let content = format!("✅ Session in <#{thread_id}> ended");
        if let Err(e) = self
            .gateway
            .send_message(channel_id, OutboundMessage::text(content))
            .await
        {
            warn!("Failed to post to coordination channel {channel_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    #[tokio::test]
    async fn test_disabled_service_posts_nothing() {
        let gateway = Arc::new(MockGateway::new());
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        let service = CoordinationService::new(dyn_gateway, None);
        assert!(!service.enabled());
        service.post_session_end(42).await;
        assert!(gateway.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_session_end_mentions_thread() {
        let gateway = Arc::new(MockGateway::new());
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        let service = CoordinationService::new(dyn_gateway, Some(500));
        service.post_session_end(42).await;
        let messages = gateway.messages_in(500);
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .message
            .content
            .as_deref()
            .unwrap()
            .contains("<#42>"));
    }
}
