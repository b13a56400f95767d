//! In-process routing bus for interactive-question answers.
//!
//! Component callbacks call [`AnswerBus::post_answer`] to deliver the
//! user's choice to the task waiting inside the answer collector. A
//! per-thread channel (rather than a one-shot) means repeated clicks never
//! panic the sender, and the waiting side can apply any timeout it likes.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Routes component interactions to the task awaiting an answer.
/// One instance is shared across all active sessions.
#[derive(Default)]
pub struct AnswerBus {
    waiters: Mutex<HashMap<i64, mpsc::UnboundedSender<Vec<String>>>>,
}

impl AnswerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for a thread and return its receiving end.
    /// Call [`Self::unregister`] when done, answered or not.
    pub fn register(&self, thread_id: i64) -> mpsc::UnboundedReceiver<Vec<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.waiters.lock().insert(thread_id, tx);
        debug!("AnswerBus: registered waiter for thread {thread_id}");
        rx
    }

    /// Deliver answers to the waiter for a thread.
    ///
    /// Returns true if a waiter was found, false if the session is gone
    /// (for example the bot restarted before the user clicked).
    pub fn post_answer(&self, thread_id: i64, answers: Vec<String>) -> bool {
        let waiters = self.waiters.lock();
        match waiters.get(&thread_id) {
            Some(tx) if tx.send(answers).is_ok() => {
                debug!("AnswerBus: delivered answer to thread {thread_id}");
                true
            },
            _ => {
                debug!("AnswerBus: no waiter for thread {thread_id} (bot restarted?)");
                false
            },
        }
    }

    /// Remove the waiter for a thread (after answer or timeout).
    pub fn unregister(&self, thread_id: i64) {
        self.waiters.lock().remove(&thread_id);
        debug!("AnswerBus: unregistered waiter for thread {thread_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_answer_reaches_registered_waiter() {
        let bus = AnswerBus::new();
        let mut rx = bus.register(1);
        assert!(bus.post_answer(1, vec!["JWT".into()]));
        assert_eq!(rx.recv().await.unwrap(), vec!["JWT".to_string()]);
    }

    #[test]
    fn test_post_answer_without_waiter_returns_false() {
        let bus = AnswerBus::new();
        assert!(!bus.post_answer(99, vec!["lost".into()]));
    }

    #[tokio::test]
    async fn test_unregister_drops_the_waiter() {
        let bus = AnswerBus::new();
        let _rx = bus.register(1);
        bus.unregister(1);
        assert!(!bus.post_answer(1, vec!["late".into()]));
    }

    #[tokio::test]
    async fn test_multiple_answers_queue_safely() {
        let bus = AnswerBus::new();
        let mut rx = bus.register(1);
        assert!(bus.post_answer(1, vec!["first".into()]));
        assert!(bus.post_answer(1, vec!["second".into()]));
        assert_eq!(rx.recv().await.unwrap(), vec!["first".to_string()]);
        assert_eq!(rx.recv().await.unwrap(), vec!["second".to_string()]);
    }
}
