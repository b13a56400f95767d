//! Pending session resumes after a process restart.
//!
//! A session about to restart the bot writes a row here. On startup the
//! bot reads the rows still inside the TTL window, deletes each one, and
//! re-enters the corresponding thread.
//!
//! Guarantees:
//! * **Single-fire** — rows are deleted before the resumed run spawns, so a
//!   crash mid-spawn cannot double-resume.
//! * **TTL** — rows older than `ttl_minutes` (default 5) are pruned on read
//!   and never returned, so stale markers don't fire after long downtime.
//! * **UNIQUE(thread_id)** — at most one pending resume per thread; a
//!   second mark overwrites the first.

use sqlx::SqlitePool;

use crate::errors::Result;

pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// One row from the pending_resumes table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingResume {
    pub id: i64,
    pub thread_id: i64,
    pub session_id: Option<String>,
    pub reason: String,
    pub resume_prompt: Option<String>,
    pub created_at: String,
}

/// CRUD for the pending_resumes table.
#[derive(Clone)]
pub struct PendingResumeRepository {
    pool: SqlitePool,
    ttl_minutes: i64,
}

impl PendingResumeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_ttl(pool, DEFAULT_TTL_MINUTES)
    }

    pub fn with_ttl(pool: SqlitePool, ttl_minutes: i64) -> Self {
        Self { pool, ttl_minutes }
    }

    /// Insert (or replace) a pending resume for a thread.
    /// Returns the row id.
    pub async fn mark(
        &self,
        thread_id: i64,
        session_id: Option<&str>,
        reason: &str,
        resume_prompt: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT OR REPLACE INTO pending_resumes
                 (thread_id, session_id, reason, resume_prompt)
             VALUES (?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(session_id)
        .bind(reason)
        .bind(resume_prompt)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All pending resumes inside the TTL window, oldest first.
    /// Expired rows are pruned in the same call.
    pub async fn get_pending(&self) -> Result<Vec<PendingResume>> {
        sqlx::query(
            "DELETE FROM pending_resumes
             WHERE created_at <= datetime('now', ?, 'localtime')",
        )
        .bind(format!("-{} minutes", self.ttl_minutes))
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PendingResume>(
            "SELECT * FROM pending_resumes ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete a pending resume by row id (call before spawning the run).
    pub async fn delete(&self, row_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_resumes WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a pending resume by thread id.
    pub async fn delete_by_thread(&self, thread_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_resumes WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
