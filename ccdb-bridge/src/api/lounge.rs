//! Lounge endpoints: read recent notes, post a note and mirror it to the
//! lounge Discord channel.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::warn;

use super::{ApiState, json_error, parse_body};
use crate::db::LoungeRepository;
use crate::gateway::OutboundMessage;

fn require_lounge_repo(state: &ApiState) -> Result<&LoungeRepository, Response> {
    state.lounge.as_ref().ok_or_else(|| {
        json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Lounge not configured (lounge repository is unavailable)",
        )
    })
}

/// GET /api/lounge?limit=N — recent lounge messages, oldest first.
pub async fn get_lounge(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let repo = match require_lounge_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };

    let limit = match params.get("limit") {
        None => 10,
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) => limit.clamp(1, 50),
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "limit must be an integer"),
        },
    };

    match repo.get_recent(limit).await {
        Ok(messages) => Json(json!({ "messages": messages })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /api/lounge — store a note and forward it to the lounge channel.
pub async fn post_lounge(State(state): State<Arc<ApiState>>, body: String) -> Response {
    let repo = match require_lounge_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(response) => return response,
    };

    let message = data
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if message.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "message is required");
    }

    let label = data
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("AI");

    let stored = match repo.post(message, label).await {
        Ok(stored) => stored,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    if let Some(channel_id) = state.lounge_channel_id {
        let clock = if stored.posted_at.len() >= 16 {
            &stored.posted_at[11..16]
        } else {
            stored.posted_at.as_str()
        };
        let content = format!("**[{}]** {} *({clock})*", stored.label, stored.message);
        if let Err(e) = state
            .gateway
            .send_message(channel_id, OutboundMessage::text(content))
            .await
        {
            warn!("Failed to forward lounge message to Discord: {e}");
        }
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "status": "posted",
            "id": stored.id,
            "label": stored.label,
            "message": stored.message,
            "posted_at": stored.posted_at,
        })),
    )
        .into_response()
}
