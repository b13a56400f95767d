//! Live tool timer.
//!
//! Periodically edits a tool embed's description to show elapsed execution
//! time for long-running tool invocations. Started on tool_use, aborted when
//! the matching tool_result arrives or the run finalizes; tools that finish
//! inside one interval never cause an edit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use ccdb_runner::ToolUse;

use crate::gateway::{Gateway, MessageRef, OutboundMessage};
use crate::ui::embeds::tool_use_embed;

/// How often in-progress tool embeds are refreshed with elapsed time.
pub const TOOL_TIMER_INTERVAL: Duration = Duration::from_secs(10);

/// Spawn the timer loop for one tool embed. Abort the handle to cancel;
/// aborting is idempotent.
pub fn start_tool_timer(
    gateway: Arc<dyn Gateway>,
    message: MessageRef,
    tool: ToolUse,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = tokio::time::Instant::now();
        loop {
            tokio::time::sleep(TOOL_TIMER_INTERVAL).await;
            let elapsed = started.elapsed().as_secs();
            let embed = tool_use_embed(&tool, true, Some(elapsed));
            if let Err(e) = gateway
                .edit_message(message, OutboundMessage::embed(embed))
                .await
            {
                debug!("Failed to refresh tool timer embed: {e}");
            }
        }
    })
}
