//! Lounge prompt builder.
//!
//! Generates the lounge context block injected into each run's ephemeral
//! system prompt. The lounge is a casual shared space where concurrent
//! sessions leave short notes for each other, mirrored to a Discord channel
//! so humans can watch along.

use crate::db::lounge::LoungeMessage;

const LOUNGE_INVITE: &str = "\
[AI LOUNGE]

This is the AI Lounge: a shared Discord channel where concurrent Claude
sessions tell each other what they are up to. Humans read it too.

**Required**: before starting work, post one short line to the lounge in
your own words — it doubles as your session-start notice.

Examples:
- \"Digging into the flaky test in the parser repo, looks gnarly\"
- \"Picking up the PR review that was requested\"
- \"Config-file fix only, should be quick\"

When you finish, drop a short sign-off too (\"done, tests green\").

Post with:
```bash
curl -s -X POST \"$CCDB_API_URL/api/lounge\" \\
  -H \"Content-Type: application/json\" \\
  -d '{\"message\": \"one short line\", \"label\": \"your nickname\"}'
```

Pick any label you like (\"bug hunter\", \"night shift\", \"frontend\").

**Before any destructive operation — read the lounge first.**
Restarting the bot, force-pushing, touching shared databases: these affect
every session. Check the recent messages below, wait or announce if someone
else is mid-task, and report before and after you act. Reading and judging
is the point, not just posting.";

const RECENT_HEADER: &str = "\nRecent lounge messages:\n";
const NO_MESSAGES: &str = "\n(Nobody here yet. Leave the first note!)\n";
const INVITE_CLOSE: &str = "\n---\n";

/// Build the lounge context block for one run.
///
/// `recent` comes from the lounge repository in chronological order
/// (oldest first). Timestamps are shown as HH:MM.
pub fn build_lounge_prompt(recent: &[LoungeMessage]) -> String {
    let mut parts = vec![LOUNGE_INVITE.to_string()];

    if recent.is_empty() {
        parts.push(NO_MESSAGES.to_string());
    } else {
        parts.push(RECENT_HEADER.to_string());
        for message in recent {
            parts.push(format!(
                "  [{}] {}: {}",
                clock_time(&message.posted_at),
                message.label,
                message.message
            ));
        }
    }

    parts.push(INVITE_CLOSE.to_string());
    parts.join("\n")
}

/// Extract HH:MM from a `YYYY-MM-DD HH:MM:SS` local timestamp.
fn clock_time(posted_at: &str) -> &str {
    if posted_at.len() >= 16 {
        &posted_at[11..16]
    } else {
        posted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64, label: &str, text: &str, posted_at: &str) -> LoungeMessage {
        LoungeMessage {
            id,
            label: label.to_string(),
            message: text.to_string(),
            posted_at: posted_at.to_string(),
        }
    }

    #[test]
    fn test_empty_lounge_invites_first_post() {
        let prompt = build_lounge_prompt(&[]);
        assert!(prompt.contains("[AI LOUNGE]"));
        assert!(prompt.contains("Leave the first note!"));
        assert!(!prompt.contains("Recent lounge messages"));
    }

    #[test]
    fn test_recent_messages_render_with_clock_time() {
        let recent = vec![
            message(1, "bug hunter", "starting on the parser", "2025-06-01 09:15:42"),
            message(2, "night shift", "done, tests green", "2025-06-01 23:05:00"),
        ];
        let prompt = build_lounge_prompt(&recent);
        assert!(prompt.contains("[09:15] bug hunter: starting on the parser"));
        assert!(prompt.contains("[23:05] night shift: done, tests green"));
        // Seconds are stripped.
        assert!(!prompt.contains("09:15:42"));
    }

    #[test]
    fn test_short_timestamp_is_shown_verbatim() {
        let recent = vec![message(1, "x", "hi", "bad-ts")];
        assert!(build_lounge_prompt(&recent).contains("[bad-ts] x: hi"));
    }
}
