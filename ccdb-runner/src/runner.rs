//! Claude Code CLI runner.
//!
//! Spawns `claude -p --output-format stream-json` as an async subprocess and
//! yields [`StreamEvent`]s parsed from its stdout.
//!
//! The subprocess is started argv-style (never through a shell) so user
//! prompts are passed as plain arguments without injection risk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::Stream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{error, info, warn};

use crate::errors::{Result, RunnerError};
use crate::parser::parse_line;
use crate::types::{RunnerOptions, StreamEvent};

/// How long `interrupt()` waits for a graceful exit before escalating.
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);
/// How long `kill()` waits after SIGTERM before sending SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// How long to wait for the exit status once stdout reaches EOF.
const EXIT_WAIT: Duration = Duration::from_secs(10);
/// Poll interval while waiting for the child to exit.
const EXIT_POLL: Duration = Duration::from_millis(100);

/// Environment variables that must never leak to the CLI subprocess.
const STRIPPED_ENV_KEYS: [&str; 4] = [
    "CLAUDECODE",
    "DISCORD_BOT_TOKEN",
    "DISCORD_TOKEN",
    "API_SECRET_KEY",
];

/// The lazy, finite event sequence produced by one run.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Manages one Claude Code CLI subprocess execution.
pub struct ClaudeRunner {
    options: RunnerOptions,
    process: Arc<ProcessGuard>,
}

impl ClaudeRunner {
    /// Create a runner from options. No process is spawned until [`Self::run`].
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            process: Arc::new(ProcessGuard::default()),
        }
    }

    /// The options this runner was built with.
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Create a fresh runner with the same configuration and no active
    /// process, optionally overriding the thread id and the ephemeral
    /// system prompt. Each run needs its own subprocess, so callers clone
    /// the base runner once per run.
    pub fn clone_with(
        &self,
        thread_id: Option<i64>,
        append_system_prompt: Option<String>,
    ) -> ClaudeRunner {
        let mut options = self.options.clone();
        if thread_id.is_some() {
            options.thread_id = thread_id;
        }
        if append_system_prompt.is_some() {
            options.append_system_prompt = append_system_prompt;
        }
        ClaudeRunner::new(options)
    }

    /// Run the CLI and stream its events.
    ///
    /// The returned stream ends when a terminal event has been yielded and
    /// the process is done. If the child exits with a positive code without
    /// producing a terminal event, a synthetic `CLI exited with code N`
    /// terminal is yielded; if the soft deadline expires, a synthetic
    /// timeout terminal is yielded. A signal exit is silent — kills are
    /// always caller-initiated.
    ///
    /// A supplied `session_id` must match `^[a-f0-9-]+$`; otherwise this
    /// fails before any process is spawned.
    pub async fn run(&self, prompt: &str, session_id: Option<&str>) -> Result<EventStream> {
        let args = self.build_args(prompt, session_id)?;
        let env = self.build_env();

        info!(
            "Starting Claude CLI: {} ...",
            args[..args.len().min(6)].join(" ")
        );

        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(env)
            .kill_on_drop(true);
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn Claude CLI: {e}");
            RunnerError::Process(e)
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Process(std::io::Error::other("failed to capture stdout")))?;
        let mut stderr = child.stderr.take();

        *self.process.child.lock().await = Some(child);

        let guard = self.process.clone();
        let timeout_seconds = self.options.timeout_seconds;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_seconds);

        let stream = async_stream::stream! {
            let mut lines = BufReader::new(stdout).lines();
            let mut saw_terminal = false;

            loop {
                match tokio::time::timeout_at(deadline, lines.next_line()).await {
                    Err(_) => {
                        warn!("Claude CLI timed out after {timeout_seconds}s");
                        saw_terminal = true;
                        yield StreamEvent::terminal_error(format!(
                            "Timed out after {timeout_seconds} seconds"
                        ));
                        break;
                    },
                    Ok(Ok(Some(line))) => {
                        if let Some(event) = parse_line(&line) {
                            let complete = event.is_complete;
                            yield event;
                            if complete {
                                saw_terminal = true;
                                break;
                            }
                        }
                    },
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        warn!("Failed to read Claude CLI stdout: {e}");
                        break;
                    },
                }
            }

            if !saw_terminal {
                guard.wait_exited(EXIT_WAIT).await;
                // A signal exit carries no code and is silent.
                if let Some(code) = guard.exit_code().await.filter(|code| *code > 0) {
                    let stderr_text = drain_stderr(stderr.take()).await;
                    error!(
                        "Claude CLI exited with code {code}: {}",
                        truncate_chars(&stderr_text, 200)
                    );
                    yield StreamEvent::terminal_error(format!("CLI exited with code {code}"));
                }
            }

            guard.kill().await;
        };

        Ok(Box::pin(stream))
    }

    /// Interrupt the subprocess with SIGINT (graceful stop, like Ctrl+C or
    /// Escape in the CLI). Gives the process a chance to flush output and
    /// preserve session state; escalates to [`Self::kill`] if it does not
    /// stop within 10 seconds. No-op when nothing is running.
    pub async fn interrupt(&self) {
        self.process.interrupt().await;
    }

    /// Terminate the subprocess, force-killing if it does not stop in time.
    /// No-op when nothing is running.
    pub async fn kill(&self) {
        self.process.kill().await;
    }

    /// Whether the subprocess is currently running.
    pub async fn is_running(&self) -> bool {
        self.process.running().await
    }

    /// Build the CLI argument vector, command included.
    ///
    /// The `--` separator is mandatory so prompts beginning with `-` are
    /// never mistaken for flags.
    pub fn build_args(&self, prompt: &str, session_id: Option<&str>) -> Result<Vec<String>> {
        let o = &self.options;
        let mut args: Vec<String> = vec![
            o.command.clone(),
            "-p".into(),
            "--output-format".into(),
            "stream-json".into(),
            "--model".into(),
            o.model.clone(),
            "--permission-mode".into(),
            o.permission_mode.clone(),
            "--verbose".into(),
        ];

        if o.include_partial_messages {
            args.push("--include-partial-messages".into());
        }
        if o.dangerously_skip_permissions {
            args.push("--dangerously-skip-permissions".into());
        }
        if !o.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(o.allowed_tools.join(","));
        }
        if let Some(prompt_suffix) = &o.append_system_prompt
            && !prompt_suffix.is_empty()
        {
            args.push("--append-system-prompt".into());
            args.push(prompt_suffix.clone());
        }

        if let Some(sid) = session_id {
            if !is_valid_session_id(sid) {
                return Err(RunnerError::InvalidSessionId(sid.to_string()));
            }
            args.push("--resume".into());
            args.push(sid.to_string());
        }

        args.push("--".into());
        args.push(prompt.to_string());
        Ok(args)
    }

    /// Build the child environment: the parent's, minus stripped secrets,
    /// plus the injected `CCDB_API_URL` / `CCDB_API_SECRET` /
    /// `DISCORD_THREAD_ID` values.
    pub fn build_env(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| !STRIPPED_ENV_KEYS.contains(&key.as_str()))
            .collect();
        if let Some(port) = self.options.api_port {
            env.insert("CCDB_API_URL".into(), format!("http://127.0.0.1:{port}"));
        }
        if let Some(secret) = &self.options.api_secret {
            env.insert("CCDB_API_SECRET".into(), secret.clone());
        }
        if let Some(thread_id) = self.options.thread_id {
            env.insert("DISCORD_THREAD_ID".into(), thread_id.to_string());
        }
        env
    }
}

/// Session ids are lowercase hex plus dashes.
fn is_valid_session_id(sid: &str) -> bool {
    !sid.is_empty()
        && sid
            .chars()
            .all(|c| matches!(c, 'a'..='f' | '0'..='9' | '-'))
}

/// Shared handle onto the child process so interrupts can reach a run in
/// flight from another task.
#[derive(Default)]
struct ProcessGuard {
    child: tokio::sync::Mutex<Option<Child>>,
}

impl ProcessGuard {
    async fn running(&self) -> bool {
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn exit_code(&self) -> Option<i32> {
        let mut guard = self.child.lock().await;
        guard.as_mut()?.try_wait().ok().flatten()?.code()
    }

    /// Deliver a signal if the child is still alive.
    async fn signal(&self, signal: i32) {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut()
            && matches!(child.try_wait(), Ok(None))
        {
            send_signal(child, signal);
        }
    }

    /// Poll until the child exits or the timeout elapses.
    /// Returns true once nothing is running.
    async fn wait_exited(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.running().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
    }

    async fn interrupt(&self) {
        if !self.running().await {
            return;
        }
        self.signal(SIGINT).await;
        if !self.wait_exited(INTERRUPT_GRACE).await {
            self.kill().await;
        }
    }

    async fn kill(&self) {
        if !self.running().await {
            return;
        }
        self.signal(SIGTERM).await;
        if !self.wait_exited(TERMINATE_GRACE).await {
            let mut guard = self.child.lock().await;
            if let Some(child) = guard.as_mut() {
                // SIGKILL and reap.
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill Claude CLI process: {e}");
                }
            }
        }
    }
}

#[cfg(unix)]
const SIGINT: i32 = libc::SIGINT;
#[cfg(unix)]
const SIGTERM: i32 = libc::SIGTERM;
#[cfg(not(unix))]
const SIGINT: i32 = 2;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;

#[cfg(unix)]
fn send_signal(child: &mut Child, signal: i32) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, signal);
        }
    }
}

#[cfg(not(unix))]
fn send_signal(child: &mut Child, _signal: i32) {
    let _ = child.start_kill();
}

/// Read whatever the child wrote to stderr, for non-zero-exit diagnostics.
async fn drain_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut buf = String::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stderr.read_to_string(&mut buf)).await;
    buf.trim().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Find the Claude CLI binary.
///
/// Search order: system PATH (`claude`, `claude-code`), then common install
/// locations under the home directory.
pub fn find_claude_cli() -> Result<PathBuf> {
    for name in ["claude", "claude-code"] {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    let home = dirs::home_dir().ok_or_else(|| RunnerError::CliNotFound {
        searched_paths: "Unable to determine home directory".into(),
    })?;

    let locations = [
        home.join(".npm-global/bin/claude"),
        PathBuf::from("/usr/local/bin/claude"),
        home.join(".local/bin/claude"),
        home.join(".yarn/bin/claude"),
        PathBuf::from("/opt/homebrew/bin/claude"),
        home.join(".claude/local/claude"),
    ];

    let mut searched = Vec::new();
    for path in &locations {
        searched.push(path.display().to_string());
        if path.is_file() {
            return Ok(path.clone());
        }
    }

    Err(RunnerError::CliNotFound {
        searched_paths: searched.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(options: RunnerOptions) -> ClaudeRunner {
        ClaudeRunner::new(options)
    }

    #[test]
    fn test_build_args_order() {
        let r = runner(RunnerOptions::default());
        let args = r.build_args("hello", None).unwrap();
        assert_eq!(
            &args[..9],
            &[
                "claude",
                "-p",
                "--output-format",
                "stream-json",
                "--model",
                "sonnet",
                "--permission-mode",
                "acceptEdits",
                "--verbose",
            ]
        );
        // Default flags end with the separator and the prompt.
        assert_eq!(args[args.len() - 3], "--include-partial-messages");
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args[args.len() - 1], "hello");
    }

    #[test]
    fn test_build_args_prompt_starting_with_dash_is_safe() {
        let r = runner(RunnerOptions::default());
        let args = r.build_args("--help", None).unwrap();
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "--help");
        assert_eq!(sep + 2, args.len());
    }

    #[test]
    fn test_build_args_optional_flags() {
        let options = RunnerOptions::builder()
            .allowed_tools(vec!["Bash".into(), "Read".into()])
            .dangerously_skip_permissions(true)
            .include_partial_messages(false)
            .append_system_prompt("extra context")
            .build();
        let args = runner(options).build_args("go", None).unwrap();
        assert!(!args.contains(&"--include-partial-messages".to_string()));
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
        let at = args.iter().position(|a| a == "--allowedTools").unwrap();
        assert_eq!(args[at + 1], "Bash,Read");
        let sp = args
            .iter()
            .position(|a| a == "--append-system-prompt")
            .unwrap();
        assert_eq!(args[sp + 1], "extra context");
    }

    #[test]
    fn test_build_args_resume() {
        let r = runner(RunnerOptions::default());
        let args = r.build_args("go", Some("abc-123-def")).unwrap();
        let at = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[at + 1], "abc-123-def");
        // Resume always precedes the separator.
        assert!(at < args.iter().position(|a| a == "--").unwrap());
    }

    #[test]
    fn test_build_args_rejects_bad_session_id() {
        let r = runner(RunnerOptions::default());
        for bad in ["abc; rm -rf /", "ABCDEF", "", "abc_123", "id with space"] {
            let err = r.build_args("go", Some(bad)).unwrap_err();
            assert!(matches!(err, RunnerError::InvalidSessionId(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_build_env_strips_secrets_and_injects() {
        unsafe {
            std::env::set_var("DISCORD_BOT_TOKEN", "secret-token");
            std::env::set_var("CLAUDECODE", "1");
            std::env::set_var("CCDB_TEST_MARKER", "kept");
        }
        let options = RunnerOptions::builder()
            .api_port(8080)
            .api_secret("s3cret")
            .thread_id(42)
            .build();
        let env = runner(options).build_env();
        assert!(!env.contains_key("DISCORD_BOT_TOKEN"));
        assert!(!env.contains_key("CLAUDECODE"));
        assert_eq!(env.get("CCDB_TEST_MARKER").map(String::as_str), Some("kept"));
        assert_eq!(
            env.get("CCDB_API_URL").map(String::as_str),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(env.get("CCDB_API_SECRET").map(String::as_str), Some("s3cret"));
        assert_eq!(env.get("DISCORD_THREAD_ID").map(String::as_str), Some("42"));
        unsafe {
            std::env::remove_var("DISCORD_BOT_TOKEN");
            std::env::remove_var("CLAUDECODE");
            std::env::remove_var("CCDB_TEST_MARKER");
        }
    }

    #[test]
    fn test_clone_with_overrides() {
        let base = runner(RunnerOptions::builder().model("opus").thread_id(1).build());
        let cloned = base.clone_with(Some(2), Some("notice".into()));
        assert_eq!(cloned.options().model, "opus");
        assert_eq!(cloned.options().thread_id, Some(2));
        assert_eq!(
            cloned.options().append_system_prompt.as_deref(),
            Some("notice")
        );
        // The original is untouched.
        assert_eq!(base.options().thread_id, Some(1));
        assert!(base.options().append_system_prompt.is_none());
    }

    #[test]
    fn test_clone_with_keeps_existing_when_no_override() {
        let base = runner(RunnerOptions::builder().thread_id(7).build());
        let cloned = base.clone_with(None, None);
        assert_eq!(cloned.options().thread_id, Some(7));
    }

    #[test]
    fn test_is_valid_session_id() {
        assert!(is_valid_session_id("0a1b2c-3d"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("G123"));
        assert!(!is_valid_session_id("abc 123"));
    }

    #[tokio::test]
    async fn test_interrupt_without_process_is_noop() {
        let r = runner(RunnerOptions::default());
        r.interrupt().await;
        r.kill().await;
        assert!(!r.is_running().await);
    }
}
