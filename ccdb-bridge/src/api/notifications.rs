//! Health, immediate notifications, and scheduled notifications.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::{Value, json};

use super::{ApiState, json_error, parse_body};
use crate::gateway::{Embed, OutboundMessage};

const DEFAULT_COLOR: i64 = 0x00BFFF;

/// GET /api/health
pub async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    }))
    .into_response()
}

/// POST /api/notify — send an immediate notification embed.
pub async fn notify(State(state): State<Arc<ApiState>>, body: String) -> Response {
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(response) => return response,
    };

    let Some(message) = data.get("message").and_then(Value::as_str).filter(|m| !m.is_empty())
    else {
        return json_error(StatusCode::BAD_REQUEST, "message is required");
    };

    let channel_id = data
        .get("channel_id")
        .and_then(Value::as_i64)
        .or(state.default_channel_id);
    let Some(channel_id) = channel_id else {
        return json_error(StatusCode::BAD_REQUEST, "No channel specified");
    };

    let embed = Embed::new()
        .title(
            data.get("title")
                .and_then(Value::as_str)
                .unwrap_or("Notification"),
        )
        .description(message)
        .color(data.get("color").and_then(Value::as_i64).unwrap_or(DEFAULT_COLOR) as u32);

    match state
        .gateway
        .send_message(channel_id, OutboundMessage::embed(embed))
        .await
    {
        Ok(_) => Json(json!({ "status": "sent" })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// POST /api/schedule — persist a notification for later delivery.
pub async fn schedule(State(state): State<Arc<ApiState>>, body: String) -> Response {
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(response) => return response,
    };

    let Some(message) = data.get("message").and_then(Value::as_str).filter(|m| !m.is_empty())
    else {
        return json_error(StatusCode::BAD_REQUEST, "message is required");
    };
    let Some(scheduled_at) = data.get("scheduled_at").and_then(Value::as_str) else {
        return json_error(StatusCode::BAD_REQUEST, "scheduled_at is required");
    };

    let Some(scheduled_at) = parse_iso8601(scheduled_at) else {
        return json_error(StatusCode::BAD_REQUEST, "scheduled_at must be ISO 8601 format");
    };

    let result = state
        .notifications
        .create(
            message,
            &scheduled_at,
            data.get("title").and_then(Value::as_str),
            data.get("color").and_then(Value::as_i64).unwrap_or(DEFAULT_COLOR),
            "api",
            data.get("channel_id").and_then(Value::as_i64),
        )
        .await;

    match result {
        Ok(id) => Json(json!({ "status": "scheduled", "id": id })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /api/scheduled — list pending notifications.
pub async fn list_scheduled(State(state): State<Arc<ApiState>>) -> Response {
    match state.notifications.get_pending(None).await {
        Ok(pending) => Json(json!({ "notifications": pending })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /api/scheduled/{id} — cancel a pending notification.
pub async fn cancel_scheduled(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Response {
    match state.notifications.cancel(id).await {
        Ok(true) => Json(json!({ "status": "cancelled" })).into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Not found or already processed"),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// Normalize an ISO-8601 timestamp to the stored second resolution.
fn parse_iso8601(raw: &str) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.naive_local())
                .ok()
        })?;
    Some(parsed.format("%Y-%m-%dT%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_variants() {
        assert_eq!(
            parse_iso8601("2025-06-01T09:30:00").as_deref(),
            Some("2025-06-01T09:30:00")
        );
        assert_eq!(
            parse_iso8601("2025-06-01T09:30:00.123456").as_deref(),
            Some("2025-06-01T09:30:00")
        );
        assert_eq!(
            parse_iso8601("2025-06-01T09:30:00+02:00").as_deref(),
            Some("2025-06-01T09:30:00")
        );
        assert!(parse_iso8601("tomorrow").is_none());
    }
}
