//! Concurrency awareness for simultaneous Claude Code sessions.
//!
//! Every run receives a generic concurrency warning in its ephemeral system
//! prompt, and an in-memory registry tracks active sessions so each one can
//! see what the others are doing.

use std::collections::HashMap;

use parking_lot::Mutex;

/// One active Claude Code session.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub thread_id: i64,
    pub description: String,
    pub working_dir: Option<String>,
}

const BASE_CONCURRENCY_NOTICE: &str = "\
[CONCURRENCY NOTICE] You are running via Discord. \
Multiple Claude Code sessions may be active simultaneously. \
To avoid conflicts:

- **Git**: Before making changes, create a branch or worktree \
(`git worktree add ../wt-{thread_id} -b session/{thread_id}`). \
Always commit and push before finishing — uncommitted changes in a shared \
working directory WILL be lost when another session switches branches.
- **Files**: Another session may be editing the same files outside of git. \
Check for recent modifications before overwriting.
- **Ports & processes**: Shared network ports or lock files may already be in use. \
Verify availability before binding.
- **Resources**: Shared databases, APIs with rate limits, or singleton processes \
may be accessed by other sessions concurrently.

If you detect a potential conflict with another session, \
stop and warn the user before proceeding.";

const OTHER_SESSIONS_HEADER: &str = "\nCurrently active sessions (avoid conflicts with these):\n";

/// Thread-safe registry of active sessions, shared across the whole bot.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<i64, ActiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an active session.
    pub fn register(&self, thread_id: i64, description: &str, working_dir: Option<String>) {
        self.sessions.lock().insert(
            thread_id,
            ActiveSession {
                thread_id,
                description: description.to_string(),
                working_dir,
            },
        );
    }

    /// Remove a session from the registry.
    pub fn unregister(&self, thread_id: i64) {
        self.sessions.lock().remove(&thread_id);
    }

    /// All active sessions.
    pub fn list_active(&self) -> Vec<ActiveSession> {
        self.sessions.lock().values().cloned().collect()
    }

    /// All active sessions except the given thread.
    pub fn list_others(&self, thread_id: i64) -> Vec<ActiveSession> {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.thread_id != thread_id)
            .cloned()
            .collect()
    }

    /// Build the full concurrency notice for a session: the base warning
    /// plus a listing of the other active sessions, if any.
    pub fn build_concurrency_notice(&self, thread_id: i64) -> String {
        let mut notice =
            BASE_CONCURRENCY_NOTICE.replace("{thread_id}", &thread_id.to_string());
        let others = self.list_others(thread_id);
        if !others.is_empty() {
            notice.push_str(OTHER_SESSIONS_HEADER);
            for session in &others {
                notice.push_str(&format!("- {}", session.description));
                if let Some(dir) = &session.working_dir {
                    notice.push_str(&format!(" (working in {dir})"));
                }
                notice.push('\n');
            }
            notice
                .push_str("\nIf your work may conflict with any of the above, stop and warn the user.\n");
        }
        notice
    }
}
