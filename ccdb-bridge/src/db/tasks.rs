//! Scheduled periodic tasks.
//!
//! Tasks are registered via the REST API (the CLI calls `POST /api/tasks`
//! from inside a session) and executed by the scheduler's master loop.

use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;

/// Wall-clock seconds since the epoch, as the tasks table stores them.
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One scheduled task.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct TaskRecord {
    pub id: i64,
    pub name: String,
    pub prompt: String,
    pub interval_seconds: i64,
    pub channel_id: i64,
    pub working_dir: Option<String>,
    pub enabled: bool,
    pub next_run_at: f64,
    pub last_run_at: Option<f64>,
    pub created_at: f64,
}

/// CRUD for the scheduled_tasks table.
#[derive(Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new scheduled task and return its id.
    ///
    /// With `run_immediately` (the default for API callers) the task fires
    /// on the next master-loop tick; otherwise it waits one full interval.
    pub async fn create(
        &self,
        name: &str,
        prompt: &str,
        interval_seconds: i64,
        channel_id: i64,
        working_dir: Option<&str>,
        run_immediately: bool,
    ) -> Result<i64> {
        let now = epoch_now();
        let next_run = if run_immediately {
            now
        } else {
            now + interval_seconds as f64
        };
        let result = sqlx::query(
            "INSERT INTO scheduled_tasks
                 (name, prompt, interval_seconds, channel_id, working_dir,
                  enabled, next_run_at, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(name)
        .bind(prompt)
        .bind(interval_seconds)
        .bind(channel_id)
        .bind(working_dir)
        .bind(next_run)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("Scheduled task created: id={id}, name={name}, interval={interval_seconds}s");
        Ok(id)
    }

    pub async fn get(&self, task_id: i64) -> Result<Option<TaskRecord>> {
        let record =
            sqlx::query_as::<_, TaskRecord>("SELECT * FROM scheduled_tasks WHERE id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    /// All tasks, enabled or not.
    pub async fn get_all(&self) -> Result<Vec<TaskRecord>> {
        let records = sqlx::query_as::<_, TaskRecord>(
            "SELECT * FROM scheduled_tasks ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Enabled tasks whose next_run_at is in the past, soonest first.
    pub async fn get_due(&self, now: f64) -> Result<Vec<TaskRecord>> {
        let records = sqlx::query_as::<_, TaskRecord>(
            "SELECT * FROM scheduled_tasks
             WHERE enabled = 1 AND next_run_at <= ?
             ORDER BY next_run_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Advance next_run_at by one interval and record last_run_at.
    /// Called before the task is dispatched so the master loop firing again
    /// within the interval cannot double-spawn it.
    pub async fn update_next_run(&self, task_id: i64, interval_seconds: i64) -> Result<()> {
        let now = epoch_now();
        sqlx::query(
            "UPDATE scheduled_tasks SET next_run_at = ?, last_run_at = ? WHERE id = ?",
        )
        .bind(now + interval_seconds as f64)
        .bind(now)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a task. Returns true if a row was deleted.
    pub async fn delete(&self, task_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable a task. Returns true if updated.
    pub async fn set_enabled(&self, task_id: i64, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduled_tasks SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Partially update a task. Returns true if anything changed.
    pub async fn update(
        &self,
        task_id: i64,
        prompt: Option<&str>,
        interval_seconds: Option<i64>,
        working_dir: Option<&str>,
    ) -> Result<bool> {
        let mut fields: Vec<&str> = Vec::new();
        if prompt.is_some() {
            fields.push("prompt = ?");
        }
        if interval_seconds.is_some() {
            fields.push("interval_seconds = ?");
        }
        if working_dir.is_some() {
            fields.push("working_dir = ?");
        }
        if fields.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE scheduled_tasks SET {} WHERE id = ?",
            fields.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(prompt) = prompt {
            query = query.bind(prompt);
        }
        if let Some(interval) = interval_seconds {
            query = query.bind(interval);
        }
        if let Some(dir) = working_dir {
            query = query.bind(dir);
        }
        let result = query.bind(task_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
