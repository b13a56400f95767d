//! Scheduler behavior: advance-before-dispatch, thread creation, and
//! notification delivery.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use ccdb_bridge::db::{self, NotificationRepository, TaskRepository, epoch_now};
use ccdb_bridge::gateway::{Gateway, MockGateway};
use ccdb_bridge::registry::SessionRegistry;
use ccdb_bridge::scheduler::Scheduler;
use ccdb_runner::{ClaudeRunner, RunnerOptions};

fn stub_cli(dir: &TempDir) -> String {
    let path = dir.path().join("stub-claude");
    std::fs::write(
        &path,
        "#!/bin/sh\n\
         echo '{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"beef\"}'\n\
         echo '{\"type\":\"result\",\"subtype\":\"success\",\"session_id\":\"beef\",\"result\":\"checked\"}'\n",
    )
    .unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

struct Fixture {
    gateway: Arc<MockGateway>,
    scheduler: Arc<Scheduler>,
    tasks: TaskRepository,
    notifications: NotificationRepository,
}

async fn fixture(command: String) -> Fixture {
    let sessions_pool = db::connect_in_memory().await.unwrap();
    db::init_sessions_db(&sessions_pool).await.unwrap();
    let tasks_pool = db::connect_in_memory().await.unwrap();
    db::init_tasks_db(&tasks_pool).await.unwrap();

    let gateway = Arc::new(MockGateway::new());
    let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
    let tasks = TaskRepository::new(tasks_pool);
    let notifications = NotificationRepository::new(sessions_pool);

    let scheduler = Scheduler::new(
        dyn_gateway,
        tasks.clone(),
        notifications.clone(),
        Arc::new(ClaudeRunner::new(
            RunnerOptions::builder().command(command).build(),
        )),
        Arc::new(SessionRegistry::new()),
        Some(200_000),
    );

    Fixture {
        gateway,
        scheduler,
        tasks,
        notifications,
    }
}

async fn wait_until<F, Fut>(what: &str, condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..600 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test]
async fn due_task_runs_in_a_fresh_thread_and_cannot_double_fire() {
    let dir = TempDir::new().unwrap();
    let f = fixture(stub_cli(&dir)).await;

    f.tasks
        .create("health-check", "check the service", 3600, 77, None, true)
        .await
        .unwrap();

    f.scheduler.tick().await;

    // next_run_at advanced before the execution was even spawned.
    assert!(f.tasks.get_due(epoch_now() + 1.0).await.unwrap().is_empty());

    // A second tick right away dispatches nothing new.
    f.scheduler.tick().await;

    wait_until("scheduled run to finish", || async {
        !f.gateway.embeds_titled("✅ Done").is_empty()
    })
    .await;

    let announcements: Vec<_> = f
        .gateway
        .messages_in(77)
        .into_iter()
        .filter(|m| {
            m.message
                .content
                .as_deref()
                .is_some_and(|c| c.contains("[Scheduled]"))
        })
        .collect();
    assert_eq!(announcements.len(), 1);
    assert!(announcements[0]
        .message
        .content
        .as_deref()
        .unwrap()
        .contains("health-check"));

    // The run streamed into the thread created off the announcement.
    let threads = f.gateway.threads.lock().clone();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].1, "[Scheduled] health-check");
    let thread_id = threads[0].0;
    assert!(f
        .gateway
        .messages_in(thread_id)
        .iter()
        .any(|m| m.message.content.as_deref() == Some("checked")));
}

#[tokio::test]
async fn disabled_tasks_never_dispatch() {
    let dir = TempDir::new().unwrap();
    let f = fixture(stub_cli(&dir)).await;

    let id = f
        .tasks
        .create("paused", "noop", 60, 77, None, true)
        .await
        .unwrap();
    f.tasks.set_enabled(id, false).await.unwrap();

    f.scheduler.tick().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(f.gateway.messages_in(77).is_empty());
}

#[tokio::test]
async fn due_notifications_are_delivered_and_marked() {
    let dir = TempDir::new().unwrap();
    let f = fixture(stub_cli(&dir)).await;

    f.notifications
        .create(
            "deploy finished",
            "2000-01-01T00:00:00",
            Some("CI"),
            0x00BFFF,
            "api",
            Some(88),
        )
        .await
        .unwrap();
    // A future notification stays untouched.
    f.notifications
        .create("later", "2099-01-01T00:00:00", None, 0x00BFFF, "api", Some(88))
        .await
        .unwrap();

    f.scheduler.tick().await;

    let delivered = f.gateway.messages_in(88);
    assert_eq!(delivered.len(), 1);
    let embed = delivered[0].message.embed.as_ref().unwrap();
    assert_eq!(embed.title.as_deref(), Some("CI"));
    assert_eq!(embed.description.as_deref(), Some("deploy finished"));

    let still_pending = f.notifications.get_pending(None).await.unwrap();
    assert_eq!(still_pending.len(), 1);
    assert_eq!(still_pending[0].message, "later");
}

#[tokio::test]
async fn notification_without_channel_is_marked_failed() {
    let dir = TempDir::new().unwrap();
    let f = fixture(stub_cli(&dir)).await;

    f.notifications
        .create("orphan", "2000-01-01T00:00:00", None, 0x00BFFF, "api", None)
        .await
        .unwrap();

    f.scheduler.tick().await;

    assert!(f.notifications.get_pending(None).await.unwrap().is_empty());
    assert!(f.gateway.messages.lock().is_empty());
}
