//! SQLite persistence.
//!
//! Two database files: the sessions DB (sessions, settings, pending asks,
//! pending resumes, lounge messages, scheduled notifications) and the tasks
//! DB (scheduled tasks). Schemas are created on first open; the migration
//! statements bring older databases up to date idempotently.
//!
//! Pools are capped at one connection so writes serialize on a single
//! logical connection; SQLite does not enjoy concurrent writers on one file.

pub mod asks;
pub mod lounge;
pub mod notifications;
pub mod resumes;
pub mod sessions;
pub mod settings;
pub mod tasks;

pub use asks::{PendingAskRecord, PendingAskRepository};
pub use lounge::{LoungeMessage, LoungeRepository};
pub use notifications::{NotificationRecord, NotificationRepository};
pub use resumes::{PendingResume, PendingResumeRepository};
pub use sessions::{SessionRecord, SessionRepository};
pub use settings::SettingsRepository;
pub use tasks::{TaskRecord, TaskRepository, epoch_now};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::errors::Result;

const SESSIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    thread_id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    working_dir TEXT,
    model TEXT,
    origin TEXT NOT NULL DEFAULT 'discord',
    summary TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
    last_used_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_last_used ON sessions(last_used_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_session_id ON sessions(session_id);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_asks (
    thread_id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    questions_json TEXT NOT NULL,
    question_idx INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE TABLE IF NOT EXISTS pending_resumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL UNIQUE,
    session_id TEXT,
    reason TEXT NOT NULL DEFAULT 'self_restart',
    resume_prompt TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE TABLE IF NOT EXISTS lounge_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    message TEXT NOT NULL,
    posted_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE TABLE IF NOT EXISTS scheduled_notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL,
    title TEXT,
    color INTEGER DEFAULT 49151,
    scheduled_at TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'api',
    channel_id INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    sent_at TEXT,
    error_message TEXT,
    created_at TEXT DEFAULT (datetime('now', 'localtime'))
);

CREATE INDEX IF NOT EXISTS idx_notif_status_scheduled
    ON scheduled_notifications(status, scheduled_at);
"#;

/// Statements that bring pre-existing databases up to the current schema.
/// Each is allowed to fail (duplicate column / index already present).
const SESSIONS_MIGRATIONS: [&str; 3] = [
    "ALTER TABLE sessions ADD COLUMN origin TEXT NOT NULL DEFAULT 'discord'",
    "ALTER TABLE sessions ADD COLUMN summary TEXT",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_session_id ON sessions(session_id)",
];

const TASKS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_tasks (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT    NOT NULL UNIQUE,
    prompt           TEXT    NOT NULL,
    interval_seconds INTEGER NOT NULL,
    channel_id       INTEGER NOT NULL,
    working_dir      TEXT,
    enabled          INTEGER NOT NULL DEFAULT 1,
    next_run_at      REAL    NOT NULL,
    last_run_at      REAL,
    created_at       REAL    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_next_run
    ON scheduled_tasks(next_run_at, enabled);
"#;

/// Open (and create if missing) a database file.
pub async fn connect(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// In-memory database, used by tests.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create the sessions-DB schema and run migrations.
pub async fn init_sessions_db(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SESSIONS_SCHEMA).execute(pool).await?;
    for statement in SESSIONS_MIGRATIONS {
        if let Err(e) = sqlx::query(statement).execute(pool).await {
            debug!("Migration skipped ({statement}): {e}");
        }
    }
    info!("Sessions database initialized");
    Ok(())
}

/// Create the tasks-DB schema.
pub async fn init_tasks_db(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(TASKS_SCHEMA).execute(pool).await?;
    info!("Tasks database initialized");
    Ok(())
}

/// True when the error is a UNIQUE-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}
