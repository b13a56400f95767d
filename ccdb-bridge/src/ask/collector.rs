//! Interactive-question answer collection.
//!
//! Walks the pending questions one at a time: persist the pending-ask row,
//! register a waiter on the bus, render the UI, await the answer (up to
//! 24 hours), clean up, and finally format the combined answers as the
//! next prompt for the same session.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use ccdb_runner::AskQuestion;

use crate::ask::bus::AnswerBus;
use crate::ask::views::{AskViewRegistry, ask_components};
use crate::db::PendingAskRepository;
use crate::gateway::{Gateway, OutboundMessage};
use crate::ui::embeds::ask_embed;

/// How long to wait for the user to answer. A full day lets people step
/// away and come back without dead buttons.
pub const ASK_ANSWER_TIMEOUT: Duration = Duration::from_secs(86_400);

const TIMED_OUT_NOTE: &str = "-# ⏰ Question timed out — please send a new message to continue.";

/// Show the UI for each question and return the formatted answer prompt,
/// or `None` if no question received an answer.
#[allow(clippy::too_many_arguments)]
pub async fn collect_ask_answers(
    gateway: &Arc<dyn Gateway>,
    bus: &Arc<AnswerBus>,
    views: &Arc<AskViewRegistry>,
    thread_id: i64,
    questions: &[AskQuestion],
    session_id: &str,
    ask_repo: Option<&PendingAskRepository>,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    for (question_idx, question) in questions.iter().enumerate() {
        // Persist first so a restart can recognize clicks on this UI.
        if let Some(repo) = ask_repo
            && let Err(e) = repo
                .save(thread_id, session_id, questions, question_idx as i64)
                .await
        {
            warn!("Failed to persist pending ask for thread {thread_id}: {e}");
        }

        // Register the waiter before the UI goes out, so a click can never
        // arrive with nobody listening.
        let mut answers = bus.register(thread_id);
        views.register(
            thread_id,
            question.options.iter().map(|o| o.label.clone()).collect(),
        );

        let ui = OutboundMessage::embed(ask_embed(&question.question, &question.header))
            .with_components(ask_components(thread_id, question));
        let message = match gateway.send_message(thread_id, ui).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Failed to render ask UI in thread {thread_id}: {e}");
                None
            },
        };

        let selected = tokio::time::timeout(ASK_ANSWER_TIMEOUT, answers.recv()).await;

        bus.unregister(thread_id);
        views.remove(thread_id);
        if let Some(repo) = ask_repo
            && let Err(e) = repo.delete(thread_id).await
        {
            warn!("Failed to delete pending ask for thread {thread_id}: {e}");
        }

        let selected = match selected {
            Ok(Some(labels)) => labels,
            Ok(None) => {
                // The waiter was cancelled out from under us (a new message
                // superseded this question). Strip the controls and let the
                // run end; the new turn takes over.
                if let Some(message) = message {
                    let patch = OutboundMessage::default().with_components(Vec::new());
                    if let Err(e) = gateway.edit_message(message, patch).await {
                        warn!("Failed to strip cancelled ask UI: {e}");
                    }
                }
                info!("Interactive question cancelled for thread {thread_id}");
                return None;
            },
            Err(_) => {
                // Timed out: strip the controls so the stale UI stays inert.
                if let Some(message) = message {
                    let patch = OutboundMessage::text(TIMED_OUT_NOTE)
                        .with_components(Vec::new())
                        .with_clear_embed();
                    if let Err(e) = gateway.edit_message(message, patch).await {
                        warn!("Failed to strip timed-out ask UI: {e}");
                    }
                }
                info!(
                    "Interactive question timed out for thread {thread_id}: {:?}",
                    question.question
                );
                continue;
            },
        };

        if selected.is_empty() {
            continue;
        }

        parts.push(format!(
            "**{}**\nAnswer: {}",
            question.question,
            selected.join(", ")
        ));
    }

    if parts.is_empty() {
        return None;
    }

    Some(format!(
        "[Response to AskUserQuestion]\n\n{}\n\nPlease continue based on these answers.",
        parts.join("\n\n")
    ))
}
