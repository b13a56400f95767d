//! Embedded REST API.
//!
//! Bound to loopback by default. When a bearer secret is configured, every
//! path except `GET /api/health` requires `Authorization: Bearer <token>`.
//! The CLI reaches this API through the `CCDB_API_URL` / `CCDB_API_SECRET`
//! environment injected by the runner.

pub mod lounge;
pub mod notifications;
pub mod tasks;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::db::{LoungeRepository, NotificationRepository, TaskRepository};
use crate::errors::Result;
use crate::gateway::Gateway;

/// Shared state behind every API handler.
pub struct ApiState {
    pub gateway: Arc<dyn Gateway>,
    pub notifications: NotificationRepository,
    /// `None` when the scheduler is disabled; task routes answer 503.
    pub tasks: Option<TaskRepository>,
    /// `None` when the lounge is not wired; lounge routes answer 503.
    pub lounge: Option<LoungeRepository>,
    pub default_channel_id: Option<i64>,
    pub lounge_channel_id: Option<i64>,
    pub secret: Option<String>,
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(notifications::health))
        .route("/api/notify", post(notifications::notify))
        .route("/api/schedule", post(notifications::schedule))
        .route("/api/scheduled", get(notifications::list_scheduled))
        .route("/api/scheduled/:id", delete(notifications::cancel_scheduled))
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/:id",
            delete(tasks::delete_task).patch(tasks::patch_task),
        )
        .route("/api/lounge", get(lounge::get_lounge).post(lounge::post_lounge))
        .layer(middleware::from_fn_with_state(state.clone(), auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start serving on the given address.
pub async fn serve(state: Arc<ApiState>, host: &str, port: u16) -> Result<JoinHandle<()>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("REST API started: http://{host}:{port}");
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server stopped: {e}");
        }
    }))
}

/// Bearer-token authentication. The health check stays open.
async fn auth(State(state): State<Arc<ApiState>>, request: Request, next: Next) -> Response {
    let Some(secret) = &state.secret else {
        return next.run(request).await;
    };
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(token) = header.strip_prefix("Bearer ") else {
        return json_error(StatusCode::UNAUTHORIZED, "Missing Authorization header");
    };
    if token != secret {
        return json_error(StatusCode::UNAUTHORIZED, "Invalid token");
    }

    next.run(request).await
}

/// A `{"error": ...}` JSON response with the given status.
pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Parse a request body as a JSON object, answering 400 on garbage.
pub(crate) fn parse_body(body: &str) -> std::result::Result<Value, Response> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => Ok(value),
        _ => Err(json_error(StatusCode::BAD_REQUEST, "Invalid JSON")),
    }
}
