//! Pending interactive-question state.
//!
//! When the model asks an interactive question, the question payload is
//! stored here before the UI renders, so a restart can recognize clicks on
//! old buttons and answer them gracefully instead of letting the
//! interaction fail. Rows are removed when answered or timed out, and
//! pruned wholesale after 48 hours.

use sqlx::SqlitePool;

use ccdb_runner::AskQuestion;

use crate::errors::Result;

/// One pending ask row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingAskRecord {
    pub thread_id: i64,
    pub session_id: String,
    pub questions_json: String,
    pub question_idx: i64,
    pub created_at: String,
}

impl PendingAskRecord {
    /// Decode the stored question payload.
    pub fn questions(&self) -> Result<Vec<AskQuestion>> {
        Ok(serde_json::from_str(&self.questions_json)?)
    }
}

/// Repository for pending_asks rows, keyed by thread id (at most one
/// pending ask per thread).
#[derive(Clone)]
pub struct PendingAskRepository {
    pool: SqlitePool,
}

impl PendingAskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the pending ask for a thread.
    pub async fn save(
        &self,
        thread_id: i64,
        session_id: &str,
        questions: &[AskQuestion],
        question_idx: i64,
    ) -> Result<()> {
        let questions_json = serde_json::to_string(questions)?;
        sqlx::query(
            "INSERT OR REPLACE INTO pending_asks
                 (thread_id, session_id, questions_json, question_idx)
             VALUES (?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(session_id)
        .bind(questions_json)
        .bind(question_idx)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, thread_id: i64) -> Result<Option<PendingAskRecord>> {
        let record = sqlx::query_as::<_, PendingAskRecord>(
            "SELECT * FROM pending_asks WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Remove the pending ask (called once answered or timed out).
    pub async fn delete(&self, thread_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_asks WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All pending asks, oldest first (used on startup recovery).
    pub async fn list_all(&self) -> Result<Vec<PendingAskRecord>> {
        let records = sqlx::query_as::<_, PendingAskRecord>(
            "SELECT * FROM pending_asks ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Delete pending asks older than `hours`. Returns the count deleted.
    pub async fn cleanup_old(&self, hours: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM pending_asks
             WHERE created_at < datetime('now', 'localtime', ? || ' hours')",
        )
        .bind(format!("-{hours}"))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
