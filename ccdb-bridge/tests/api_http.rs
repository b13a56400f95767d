//! HTTP API behavior: auth, status codes, and side effects on the mock
//! gateway and the repositories.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use ccdb_bridge::api::{ApiState, router};
use ccdb_bridge::db::{
    self, LoungeRepository, NotificationRepository, TaskRepository,
};
use ccdb_bridge::gateway::{Gateway, MockGateway};

struct Fixture {
    gateway: Arc<MockGateway>,
    state: Arc<ApiState>,
}

async fn fixture(secret: Option<&str>, with_tasks: bool) -> Fixture {
    let sessions_pool = db::connect_in_memory().await.unwrap();
    db::init_sessions_db(&sessions_pool).await.unwrap();
    let tasks_pool = db::connect_in_memory().await.unwrap();
    db::init_tasks_db(&tasks_pool).await.unwrap();

    let gateway = Arc::new(MockGateway::new());
    let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
    let state = Arc::new(ApiState {
        gateway: dyn_gateway,
        notifications: NotificationRepository::new(sessions_pool.clone()),
        tasks: with_tasks.then(|| TaskRepository::new(tasks_pool)),
        lounge: Some(LoungeRepository::new(sessions_pool)),
        default_channel_id: Some(100),
        lounge_channel_id: Some(200),
        secret: secret.map(String::from),
    });
    Fixture { gateway, state }
}

fn app(fixture: &Fixture) -> Router {
    router(fixture.state.clone())
}

async fn request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

// ----------------------------------------------------------------------
// Health & auth
// ----------------------------------------------------------------------

#[tokio::test]
async fn health_is_open_even_with_a_secret() {
    let f = fixture(Some("s3cret"), true).await;
    let (status, body) = request(app(&f), "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn missing_bearer_is_rejected() {
    let f = fixture(Some("s3cret"), true).await;
    let (status, body) = request(app(&f), "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing Authorization header");
}

#[tokio::test]
async fn wrong_bearer_is_rejected() {
    let f = fixture(Some("s3cret"), true).await;
    let (status, body) = request(app(&f), "GET", "/api/tasks", None, Some("nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn valid_bearer_passes() {
    let f = fixture(Some("s3cret"), true).await;
    let (status, _) = request(app(&f), "GET", "/api/tasks", None, Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn no_secret_means_no_auth() {
    let f = fixture(None, true).await;
    let (status, _) = request(app(&f), "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// ----------------------------------------------------------------------
// Notify & schedule
// ----------------------------------------------------------------------

#[tokio::test]
async fn notify_requires_a_message() {
    let f = fixture(None, true).await;
    let (status, body) = request(app(&f), "POST", "/api/notify", Some(json!({})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "message is required");
}

#[tokio::test]
async fn notify_sends_an_embed_to_the_default_channel() {
    let f = fixture(None, true).await;
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/notify",
        Some(json!({"message": "build finished", "title": "CI"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");

    let messages = f.gateway.messages_in(100);
    assert_eq!(messages.len(), 1);
    let embed = messages[0].message.embed.as_ref().unwrap();
    assert_eq!(embed.title.as_deref(), Some("CI"));
    assert_eq!(embed.description.as_deref(), Some("build finished"));
}

#[tokio::test]
async fn schedule_validates_the_timestamp() {
    let f = fixture(None, true).await;
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/schedule",
        Some(json!({"message": "reminder", "scheduled_at": "tomorrow-ish"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "scheduled_at must be ISO 8601 format");
}

#[tokio::test]
async fn schedule_list_cancel_round_trip() {
    let f = fixture(None, true).await;
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/schedule",
        Some(json!({"message": "reminder", "scheduled_at": "2030-01-01T09:00:00"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();

    let (_, listed) = request(app(&f), "GET", "/api/scheduled", None, None).await;
    assert_eq!(listed["notifications"].as_array().unwrap().len(), 1);

    let (status, _) = request(
        app(&f),
        "DELETE",
        &format!("/api/scheduled/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A second cancel finds nothing pending.
    let (status, _) = request(
        app(&f),
        "DELETE",
        &format!("/api/scheduled/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ----------------------------------------------------------------------
// Tasks
// ----------------------------------------------------------------------

fn task_body(name: &str) -> Value {
    json!({
        "name": name,
        "prompt": "check the backlog",
        "interval_seconds": 3600,
        "channel_id": 100
    })
}

#[tokio::test]
async fn task_creation_returns_201_and_409_on_duplicates() {
    let f = fixture(None, true).await;
    let (status, body) =
        request(app(&f), "POST", "/api/tasks", Some(task_body("daily")), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "created");

    let (status, body) =
        request(app(&f), "POST", "/api/tasks", Some(task_body("daily")), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Task name already exists");
}

#[tokio::test]
async fn task_creation_validates_required_fields() {
    let f = fixture(None, true).await;
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/tasks",
        Some(json!({"name": "x", "prompt": "y"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "interval_seconds is required");

    let (status, _) = request(app(&f), "POST", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_routes_answer_503_without_a_scheduler() {
    let f = fixture(None, false).await;
    let (status, _) = request(app(&f), "POST", "/api/tasks", Some(task_body("x")), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = request(app(&f), "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn task_list_patch_delete_flow() {
    let f = fixture(None, true).await;
    let (_, created) =
        request(app(&f), "POST", "/api/tasks", Some(task_body("flow")), None).await;
    let id = created["id"].as_i64().unwrap();

    let (_, listed) = request(app(&f), "GET", "/api/tasks", None, None).await;
    let tasks = listed["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["enabled"], json!(true));

    let (status, _) = request(
        app(&f),
        "PATCH",
        &format!("/api/tasks/{id}"),
        Some(json!({"enabled": false, "interval_seconds": 60})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = request(app(&f), "GET", "/api/tasks", None, None).await;
    assert_eq!(listed["tasks"][0]["enabled"], json!(false));
    assert_eq!(listed["tasks"][0]["interval_seconds"], json!(60));

    let (status, _) = request(app(&f), "PATCH", "/api/tasks/999", Some(json!({"prompt": "x"})), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        request(app(&f), "DELETE", &format!("/api/tasks/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
        request(app(&f), "DELETE", &format!("/api/tasks/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ----------------------------------------------------------------------
// Lounge
// ----------------------------------------------------------------------

#[tokio::test]
async fn lounge_post_stores_and_forwards() {
    let f = fixture(None, true).await;
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/lounge",
        Some(json!({"message": "starting on the parser", "label": "bug hunter"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "posted");
    assert_eq!(body["label"], "bug hunter");

    // Forwarded to the lounge channel as **[label]** message *(HH:MM)*.
    let forwarded = f.gateway.messages_in(200);
    assert_eq!(forwarded.len(), 1);
    let content = forwarded[0].message.content.clone().unwrap();
    assert!(content.starts_with("**[bug hunter]** starting on the parser *("));
    assert!(content.ends_with(")*"));
}

#[tokio::test]
async fn lounge_post_requires_a_message() {
    let f = fixture(None, true).await;
    let (status, _) = request(
        app(&f),
        "POST",
        "/api/lounge",
        Some(json!({"message": "   "})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lounge_long_message_is_stored_capped() {
    let f = fixture(None, true).await;
    let long = "m".repeat(2000);
    let (status, body) = request(
        app(&f),
        "POST",
        "/api/lounge",
        Some(json!({ "message": long })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"].as_str().unwrap().chars().count(), 1000);
}

#[tokio::test]
async fn lounge_get_clamps_the_limit_silently() {
    let f = fixture(None, true).await;
    for i in 0..5 {
        request(
            app(&f),
            "POST",
            "/api/lounge",
            Some(json!({"message": format!("note {i}")})),
            None,
        )
        .await;
    }

    let (status, body) = request(app(&f), "GET", "/api/lounge?limit=9999", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 5);

    let (status, body) = request(app(&f), "GET", "/api/lounge?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    // Oldest-first within the newest N.
    assert_eq!(messages[0]["message"], "note 3");
    assert_eq!(messages[1]["message"], "note 4");

    let (status, body) = request(app(&f), "GET", "/api/lounge?limit=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "limit must be an integer");
}
