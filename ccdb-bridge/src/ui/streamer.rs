//! Streaming message manager.
//!
//! Maintains one Discord message that is appended-and-edited as streaming
//! text arrives. Created on first text, then edited at a debounced interval
//! to respect Discord rate limits; when the text outgrows a message, the
//! current one is finalized and a new one takes the overflow.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::gateway::{Gateway, MessageRef, OutboundMessage};

/// Minimum time between edits. Discord allows 5 edits / 5 s per message.
pub const STREAM_EDIT_INTERVAL: Duration = Duration::from_millis(1500);

/// Max buffered characters before starting a new streaming message.
pub const STREAM_MAX_CHARS: usize = 1900;

struct StreamerInner {
    message: Option<MessageRef>,
    buffer: String,
    last_edit: Option<tokio::time::Instant>,
    pending_edit: Option<JoinHandle<()>>,
    finalized: bool,
}

/// One in-flight streaming text block.
pub struct StreamingMessageManager {
    gateway: Arc<dyn Gateway>,
    channel_id: i64,
    inner: Arc<Mutex<StreamerInner>>,
}

impl StreamingMessageManager {
    pub fn new(gateway: Arc<dyn Gateway>, channel_id: i64) -> Self {
        Self {
            gateway,
            channel_id,
            inner: Arc::new(Mutex::new(StreamerInner {
                message: None,
                buffer: String::new(),
                last_edit: None,
                pending_edit: None,
                finalized: false,
            })),
        }
    }

    pub async fn has_content(&self) -> bool {
        !self.inner.lock().await.buffer.is_empty()
    }

    /// Append text to the buffer and flush or schedule a trailing edit.
    pub async fn append(&self, text: &str) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }

        inner.buffer.push_str(text);

        // Roll over to a fresh message when the buffer outgrows one.
        if inner.buffer.len() > STREAM_MAX_CHARS && inner.message.is_some() {
            flush(&self.gateway, self.channel_id, &mut inner).await;
            inner.message = None;
            let cut = floor_char_boundary(&inner.buffer, STREAM_MAX_CHARS);
            inner.buffer = inner.buffer[cut..].to_string();
        }

        let due = match inner.last_edit {
            None => true,
            Some(at) => at.elapsed() >= STREAM_EDIT_INTERVAL,
        };
        if due {
            flush(&self.gateway, self.channel_id, &mut inner).await;
        } else if inner
            .pending_edit
            .as_ref()
            .is_none_or(|task| task.is_finished())
        {
            // Coalesce into one trailing edit instead of queueing per append.
            let gateway = self.gateway.clone();
            let channel_id = self.channel_id;
            let shared = self.inner.clone();
            inner.pending_edit = Some(tokio::spawn(async move {
                let wait = {
                    let inner = shared.lock().await;
                    match inner.last_edit {
                        Some(at) => STREAM_EDIT_INTERVAL.saturating_sub(at.elapsed()),
                        None => Duration::ZERO,
                    }
                };
                tokio::time::sleep(wait).await;
                let mut inner = shared.lock().await;
                if !inner.finalized {
                    flush(&gateway, channel_id, &mut inner).await;
                }
            }));
        }
    }

    /// Finalize the streaming message: cancel pending edits and flush the
    /// tail. Returns the full buffered text.
    pub async fn finalize(&self) -> String {
        let mut inner = self.inner.lock().await;
        inner.finalized = true;
        if let Some(task) = inner.pending_edit.take() {
            task.abort();
        }
        if !inner.buffer.is_empty() {
            flush(&self.gateway, self.channel_id, &mut inner).await;
        }
        inner.buffer.clone()
    }
}

/// Send or edit the current message with the buffer contents.
/// Transport errors are swallowed; the stream continues.
async fn flush(gateway: &Arc<dyn Gateway>, channel_id: i64, inner: &mut StreamerInner) {
    if inner.buffer.is_empty() {
        return;
    }

    let mut display = inner.buffer.clone();
    if display.len() > 2000 {
        let cut = floor_char_boundary(&display, 1997);
        display.truncate(cut);
        display.push_str("...");
    }

    let result = match inner.message {
        None => match gateway
            .send_message(channel_id, OutboundMessage::text(display))
            .await
        {
            Ok(message) => {
                inner.message = Some(message);
                Ok(())
            },
            Err(e) => Err(e),
        },
        Some(message) => gateway
            .edit_message(message, OutboundMessage::text(display))
            .await,
    };

    if let Err(e) = result {
        debug!("Failed to send/edit streaming message: {e}");
    }
    inner.last_edit = Some(tokio::time::Instant::now());
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;

    fn streamer(gateway: &Arc<MockGateway>) -> StreamingMessageManager {
        let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
        StreamingMessageManager::new(dyn_gateway, 1)
    }

    #[tokio::test]
    async fn test_first_append_sends_a_message() {
        let gateway = Arc::new(MockGateway::new());
        let s = streamer(&gateway);
        s.append("hello").await;
        assert!(s.has_content().await);
        assert_eq!(gateway.text_contents(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_later_appends_edit_in_place() {
        let gateway = Arc::new(MockGateway::new());
        let s = streamer(&gateway);
        s.append("hello").await;
        s.append(" world").await;
        let text = s.finalize().await;
        assert_eq!(text, "hello world");
        // One message, edited in place, never a second send.
        let messages = gateway.messages_in(1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message.content.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_overflow_starts_a_new_message() {
        let gateway = Arc::new(MockGateway::new());
        let s = streamer(&gateway);
        s.append(&"a".repeat(1000)).await;
        s.append(&"b".repeat(1000)).await;
        s.finalize().await;
        let messages = gateway.messages_in(1);
        assert_eq!(messages.len(), 2);
        let first = messages[0].message.content.clone().unwrap();
        let second = messages[1].message.content.clone().unwrap();
        assert!(first.len() <= 2000);
        assert_eq!(second, "b".repeat(100));
    }

    #[tokio::test]
    async fn test_append_after_finalize_is_ignored() {
        let gateway = Arc::new(MockGateway::new());
        let s = streamer(&gateway);
        s.append("hello").await;
        s.finalize().await;
        s.append(" ignored").await;
        assert_eq!(
            gateway.messages_in(1)[0].message.content.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_transport_errors_are_swallowed() {
        let gateway = Arc::new(MockGateway::new());
        let s = streamer(&gateway);
        gateway.fail_from_now_on();
        s.append("hello").await;
        let text = s.finalize().await;
        // The buffer survives even though nothing reached the wire.
        assert_eq!(text, "hello");
    }
}
