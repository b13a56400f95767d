//! Lounge message storage.
//!
//! Messages live in the shared sessions DB and are pruned to the most
//! recent 200 on every insert so the table stays small.

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{BridgeError, Result};

/// Retention cap for stored lounge messages.
pub const MAX_STORED_MESSAGES: i64 = 200;

const MAX_LABEL_CHARS: usize = 50;
const MAX_MESSAGE_CHARS: usize = 1000;

/// A single lounge message.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LoungeMessage {
    pub id: i64,
    pub label: String,
    pub message: String,
    pub posted_at: String,
}

/// Read/write lounge messages.
#[derive(Clone)]
pub struct LoungeRepository {
    pool: SqlitePool,
}

impl LoungeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new lounge message and return it; prunes anything beyond
    /// the retention cap in the same transaction.
    pub async fn post(&self, message: &str, label: &str) -> Result<LoungeMessage> {
        let label: String = if label.is_empty() { "AI" } else { label }
            .chars()
            .take(MAX_LABEL_CHARS)
            .collect();
        let message: String = message.chars().take(MAX_MESSAGE_CHARS).collect();

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO lounge_messages (label, message) VALUES (?, ?)")
            .bind(&label)
            .bind(&message)
            .execute(&mut *tx)
            .await?;
        let row_id = result.last_insert_rowid();

        let stored = sqlx::query_as::<_, LoungeMessage>(
            "SELECT id, label, message, posted_at FROM lounge_messages WHERE id = ?",
        )
        .bind(row_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM lounge_messages WHERE id NOT IN
             (SELECT id FROM lounge_messages ORDER BY id DESC LIMIT ?)",
        )
        .bind(MAX_STORED_MESSAGES)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let stored = stored.ok_or_else(|| {
            BridgeError::Config(format!("failed to retrieve lounge message id={row_id}"))
        })?;
        info!("Lounge message posted by {:?} (id={})", stored.label, stored.id);
        Ok(stored)
    }

    /// The most recent messages, oldest first.
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<LoungeMessage>> {
        let rows = sqlx::query_as::<_, LoungeMessage>(
            "SELECT id, label, message, posted_at FROM (
                 SELECT id, label, message, posted_at FROM lounge_messages
                 ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Total number of stored messages.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lounge_messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
