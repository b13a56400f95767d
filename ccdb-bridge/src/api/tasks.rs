//! Scheduled-task registration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{ApiState, json_error, parse_body};
use crate::db::{TaskRepository, is_unique_violation};

fn require_task_repo(state: &ApiState) -> Result<&TaskRepository, Response> {
    state.tasks.as_ref().ok_or_else(|| {
        json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Scheduler not configured (task repository is unavailable)",
        )
    })
}

/// POST /api/tasks — register a periodic Claude Code task.
pub async fn create_task(State(state): State<Arc<ApiState>>, body: String) -> Response {
    let repo = match require_task_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(response) => return response,
    };

    for field in ["name", "prompt", "interval_seconds", "channel_id"] {
        let missing = match data.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Number(n)) => n.as_i64() == Some(0),
            _ => false,
        };
        if missing {
            return json_error(StatusCode::BAD_REQUEST, &format!("{field} is required"));
        }
    }

    let name = data["name"].as_str().unwrap_or_default();
    let prompt = data["prompt"].as_str().unwrap_or_default();
    let Some(interval_seconds) = data["interval_seconds"].as_i64() else {
        return json_error(StatusCode::BAD_REQUEST, "interval_seconds must be an integer");
    };
    let Some(channel_id) = data["channel_id"].as_i64() else {
        return json_error(StatusCode::BAD_REQUEST, "channel_id must be an integer");
    };

    let result = repo
        .create(
            name,
            prompt,
            interval_seconds,
            channel_id,
            data.get("working_dir").and_then(Value::as_str),
            data.get("run_immediately").and_then(Value::as_bool).unwrap_or(true),
        )
        .await;

    match result {
        Ok(id) => {
            info!("Task registered via API: id={id}, name={name}");
            (
                StatusCode::CREATED,
                Json(json!({ "status": "created", "id": id })),
            )
                .into_response()
        },
        Err(crate::errors::BridgeError::Database(e)) if is_unique_violation(&e) => {
            warn!("Duplicate task name rejected: {name}");
            json_error(StatusCode::CONFLICT, "Task name already exists")
        },
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /api/tasks — list all registered tasks.
pub async fn list_tasks(State(state): State<Arc<ApiState>>) -> Response {
    let repo = match require_task_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };
    match repo.get_all().await {
        Ok(tasks) => Json(json!({ "tasks": tasks })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /api/tasks/{id} — remove a task.
pub async fn delete_task(State(state): State<Arc<ApiState>>, Path(id): Path<i64>) -> Response {
    let repo = match require_task_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };
    match repo.delete(id).await {
        Ok(true) => Json(json!({ "status": "deleted" })).into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Task not found"),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// PATCH /api/tasks/{id} — partial update (enabled, prompt, interval,
/// working dir).
pub async fn patch_task(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    body: String,
) -> Response {
    let repo = match require_task_repo(&state) {
        Ok(repo) => repo,
        Err(response) => return response,
    };
    let data = match parse_body(&body) {
        Ok(data) => data,
        Err(response) => return response,
    };

    let mut updated = false;

    if let Some(enabled) = data.get("enabled").and_then(Value::as_bool) {
        match repo.set_enabled(id, enabled).await {
            Ok(changed) => updated |= changed,
            Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }

    let prompt = data.get("prompt").and_then(Value::as_str);
    let interval_seconds = data.get("interval_seconds").and_then(Value::as_i64);
    let working_dir = data.get("working_dir").and_then(Value::as_str);
    if prompt.is_some() || interval_seconds.is_some() || working_dir.is_some() {
        match repo.update(id, prompt, interval_seconds, working_dir).await {
            Ok(changed) => updated |= changed,
            Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }

    if updated {
        Json(json!({ "status": "updated" })).into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, "Task not found")
    }
}
