//! Session repository: the durable thread ↔ CLI-session mapping.

use sqlx::SqlitePool;

use crate::errors::{BridgeError, Result};

/// A stored session mapping.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub thread_id: i64,
    pub session_id: String,
    pub working_dir: Option<String>,
    pub model: Option<String>,
    pub origin: String,
    pub summary: Option<String>,
    pub created_at: String,
    pub last_used_at: String,
}

/// CRUD operations for session records.
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a session by Discord thread id.
    pub async fn get(&self, thread_id: i64) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM sessions WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Create or update a session mapping with the default origin.
    pub async fn save(&self, thread_id: i64, session_id: &str) -> Result<SessionRecord> {
        self.save_full(thread_id, session_id, None, None, "discord", None)
            .await
    }

    /// Create or update a session mapping. On conflict the session id and
    /// `last_used_at` always refresh; the optional fields only overwrite
    /// when non-null.
    pub async fn save_full(
        &self,
        thread_id: i64,
        session_id: &str,
        working_dir: Option<&str>,
        model: Option<&str>,
        origin: &str,
        summary: Option<&str>,
    ) -> Result<SessionRecord> {
        sqlx::query(
            r#"INSERT INTO sessions
                 (thread_id, session_id, working_dir, model, origin, summary)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(thread_id) DO UPDATE SET
                 session_id = excluded.session_id,
                 working_dir = COALESCE(excluded.working_dir, sessions.working_dir),
                 model = COALESCE(excluded.model, sessions.model),
                 origin = COALESCE(excluded.origin, sessions.origin),
                 summary = COALESCE(excluded.summary, sessions.summary),
                 last_used_at = datetime('now', 'localtime')"#,
        )
        .bind(thread_id)
        .bind(session_id)
        .bind(working_dir)
        .bind(model)
        .bind(origin)
        .bind(summary)
        .execute(&self.pool)
        .await?;

        self.get(thread_id).await?.ok_or_else(|| {
            BridgeError::Config(format!(
                "failed to retrieve session after save for thread {thread_id}"
            ))
        })
    }

    /// Reverse lookup by CLI session id.
    pub async fn get_by_session_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// All sessions ordered by most recently used, optionally filtered by
    /// origin (`discord` / `cli`).
    pub async fn list_all(&self, limit: i64, origin: Option<&str>) -> Result<Vec<SessionRecord>> {
        let records = match origin {
            Some(origin) => {
                sqlx::query_as::<_, SessionRecord>(
                    "SELECT * FROM sessions WHERE origin = ?
                     ORDER BY last_used_at DESC LIMIT ?",
                )
                .bind(origin)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, SessionRecord>(
                    "SELECT * FROM sessions ORDER BY last_used_at DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            },
        };
        Ok(records)
    }

    /// Delete a session mapping. Returns true if a row was deleted.
    pub async fn delete(&self, thread_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete sessions idle for more than `days` days. Returns the count.
    pub async fn cleanup_old(&self, days: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM sessions
             WHERE julianday('now', 'localtime') - julianday(last_used_at) >= ?",
        )
        .bind(days)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
