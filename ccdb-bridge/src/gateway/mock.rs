//! In-memory [`Gateway`] for tests.
//!
//! Records every call and hands out monotonically increasing message ids so
//! tests can assert on the exact sequence of Discord side-effects without a
//! network.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Gateway, MessageRef, OutboundMessage};
use crate::errors::{BridgeError, Result};

/// One message as the mock currently sees it (edits applied in place).
#[derive(Debug, Clone)]
pub struct MockMessage {
    pub reference: MessageRef,
    pub message: OutboundMessage,
    pub edit_count: usize,
}

/// Recording [`Gateway`] test double.
#[derive(Default)]
pub struct MockGateway {
    next_id: AtomicI64,
    fail_all: AtomicBool,
    pub messages: Mutex<Vec<MockMessage>>,
    pub deleted: Mutex<Vec<MessageRef>>,
    pub threads: Mutex<Vec<(i64, String)>>,
    pub reactions: Mutex<Vec<(MessageRef, String, bool)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise swallow-and-log paths.
    pub fn fail_from_now_on(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("mock gateway failure".into()));
        }
        Ok(())
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1000
    }

    /// All messages currently in `channel_id`, in send order.
    pub fn messages_in(&self, channel_id: i64) -> Vec<MockMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.reference.channel_id == channel_id)
            .cloned()
            .collect()
    }

    /// Messages whose embed title starts with `prefix`.
    pub fn embeds_titled(&self, prefix: &str) -> Vec<MockMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| {
                m.message
                    .embed
                    .as_ref()
                    .and_then(|e| e.title.as_deref())
                    .is_some_and(|t| t.starts_with(prefix))
            })
            .cloned()
            .collect()
    }

    /// Plain text contents of all non-embed messages, in send order.
    pub fn text_contents(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.message.embed.is_none())
            .filter_map(|m| m.message.content.clone())
            .collect()
    }

    /// Look up one message by id.
    pub fn get(&self, message_id: i64) -> Option<MockMessage> {
        self.messages
            .lock()
            .iter()
            .find(|m| m.reference.message_id == message_id)
            .cloned()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send_message(&self, channel_id: i64, message: OutboundMessage) -> Result<MessageRef> {
        self.check()?;
        let reference = MessageRef {
            channel_id,
            message_id: self.allocate_id(),
        };
        self.messages.lock().push(MockMessage {
            reference,
            message,
            edit_count: 0,
        });
        Ok(reference)
    }

    async fn edit_message(&self, target: MessageRef, message: OutboundMessage) -> Result<()> {
        self.check()?;
        let mut messages = self.messages.lock();
        let existing = messages
            .iter_mut()
            .find(|m| m.reference == target)
            .ok_or_else(|| BridgeError::Transport("mock: no such message".into()))?;
        if let Some(content) = message.content {
            existing.message.content = Some(content);
        }
        if let Some(embed) = message.embed {
            existing.message.embed = Some(embed);
        } else if message.clear_embed {
            existing.message.embed = None;
        }
        if let Some(components) = message.components {
            existing.message.components = Some(components);
        }
        existing.edit_count += 1;
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<()> {
        self.check()?;
        self.messages.lock().retain(|m| m.reference != target);
        self.deleted.lock().push(target);
        Ok(())
    }

    async fn create_thread(
        &self,
        _channel_id: i64,
        name: &str,
        _from_message: Option<MessageRef>,
    ) -> Result<i64> {
        self.check()?;
        let thread_id = self.allocate_id();
        self.threads.lock().push((thread_id, name.to_string()));
        Ok(thread_id)
    }

    async fn add_reaction(&self, target: MessageRef, emoji: &str) -> Result<()> {
        self.check()?;
        self.reactions.lock().push((target, emoji.to_string(), true));
        Ok(())
    }

    async fn remove_reaction(&self, target: MessageRef, emoji: &str) -> Result<()> {
        self.check()?;
        self.reactions
            .lock()
            .push((target, emoji.to_string(), false));
        Ok(())
    }
}
