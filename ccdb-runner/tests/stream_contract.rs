//! End-to-end tests of the runner's streaming contract against stub CLI
//! scripts that emit canned stream-json output.

#![cfg(unix)]

use ccdb_runner::{ClaudeRunner, MessageKind, RunnerOptions};
use futures::StreamExt;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

/// Write an executable shell script standing in for the Claude CLI.
/// Stub scripts ignore the argument vector entirely.
fn stub_cli(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("stub-claude");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn runner_for(command: String, timeout_seconds: u64) -> ClaudeRunner {
    ClaudeRunner::new(
        RunnerOptions::builder()
            .command(command)
            .timeout_seconds(timeout_seconds)
            .build(),
    )
}

#[tokio::test]
async fn terminal_event_ends_the_stream() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo '{"type": "system", "subtype": "init", "session_id": "s1"}'
echo '{"type": "result", "subtype": "success", "session_id": "s1", "result": "hi", "cost_usd": 0.01, "duration_ms": 500}'
echo '{"type": "system", "subtype": "after-terminal", "session_id": "never-seen"}'"#,
    );

    let runner = runner_for(cmd, 30);
    let events: Vec<_> = runner.run("hello", None).await.unwrap().collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, MessageKind::System);
    assert_eq!(events[0].session_id.as_deref(), Some("s1"));
    let terminal = &events[1];
    assert!(terminal.is_complete);
    assert!(terminal.error.is_none());
    assert_eq!(terminal.text.as_deref(), Some("hi"));
    assert_eq!(terminal.cost_usd, Some(0.01));
    assert!(!runner.is_running().await);
}

#[tokio::test]
async fn nonzero_exit_without_terminal_yields_synthetic_error() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo '{"type": "system", "subtype": "init", "session_id": "s2"}'
echo "something broke" >&2
exit 3"#,
    );

    let events: Vec<_> = runner_for(cmd, 30)
        .run("hello", None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    let terminal = &events[1];
    assert!(terminal.is_complete);
    assert_eq!(terminal.error.as_deref(), Some("CLI exited with code 3"));
}

#[tokio::test]
async fn clean_exit_without_terminal_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo '{"type": "system", "subtype": "init", "session_id": "s3"}'"#,
    );

    let events: Vec<_> = runner_for(cmd, 30)
        .run("hello", None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events.iter().all(|e| e.error.is_none()));
}

#[tokio::test]
async fn unparseable_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo 'not json at all'
echo '{"type": "unknown-kind"}'
echo '{"type": "result", "subtype": "success", "session_id": "s4"}'"#,
    );

    let events: Vec<_> = runner_for(cmd, 30)
        .run("hello", None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events[0].is_complete);
}

#[tokio::test]
async fn deadline_expiry_yields_timeout_terminal() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo '{"type": "system", "subtype": "init", "session_id": "s5"}'
exec sleep 30"#,
    );

    let runner = runner_for(cmd, 1);
    let events: Vec<_> = runner.run("hello", None).await.unwrap().collect().await;

    let terminal = events.last().unwrap();
    assert!(terminal.is_complete);
    assert_eq!(
        terminal.error.as_deref(),
        Some("Timed out after 1 seconds")
    );
    assert!(!runner.is_running().await);
}

#[tokio::test]
async fn interrupt_stops_a_hanging_run_silently() {
    let dir = TempDir::new().unwrap();
    let cmd = stub_cli(
        &dir,
        r#"echo '{"type": "system", "subtype": "init", "session_id": "s6"}'
exec sleep 30"#,
    );

    let runner = std::sync::Arc::new(runner_for(cmd, 60));
    let mut stream = runner.run("hello", None).await.unwrap();

    // First event proves the child is up, then stop it from the outside.
    let first = stream.next().await.unwrap();
    assert_eq!(first.kind, MessageKind::System);

    let interrupter = runner.clone();
    let handle = tokio::spawn(async move { interrupter.interrupt().await });

    // A signal exit must not produce an error event.
    let rest: Vec<_> = stream.collect().await;
    assert!(rest.iter().all(|e| e.error.is_none()));
    handle.await.unwrap();
    assert!(!runner.is_running().await);

    // Interrupting a stopped runner is a no-op.
    runner.interrupt().await;
}
