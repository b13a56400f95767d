//! Scheduled push notifications, registered via the REST API and delivered
//! by the scheduler loop.

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;

/// A scheduled notification row.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub message: String,
    pub title: Option<String>,
    pub color: i64,
    pub scheduled_at: String,
    pub source: String,
    pub channel_id: Option<i64>,
    pub status: String,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
}

/// CRUD for the scheduled_notifications table.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Schedule a notification. Returns the created id.
    pub async fn create(
        &self,
        message: &str,
        scheduled_at: &str,
        title: Option<&str>,
        color: i64,
        source: &str,
        channel_id: Option<i64>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO scheduled_notifications
                 (message, title, color, scheduled_at, source, channel_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message)
        .bind(title)
        .bind(color)
        .bind(scheduled_at)
        .bind(source)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("Notification scheduled: id={id}, at={scheduled_at}");
        Ok(id)
    }

    /// Pending notifications, optionally only those due at or before
    /// `before`, soonest first.
    pub async fn get_pending(&self, before: Option<&str>) -> Result<Vec<NotificationRecord>> {
        let records = match before {
            Some(before) => {
                sqlx::query_as::<_, NotificationRecord>(
                    "SELECT * FROM scheduled_notifications
                     WHERE status = 'pending' AND scheduled_at <= ?
                     ORDER BY scheduled_at",
                )
                .bind(before)
                .fetch_all(&self.pool)
                .await?
            },
            None => {
                sqlx::query_as::<_, NotificationRecord>(
                    "SELECT * FROM scheduled_notifications
                     WHERE status = 'pending'
                     ORDER BY scheduled_at",
                )
                .fetch_all(&self.pool)
                .await?
            },
        };
        Ok(records)
    }

    /// Mark a notification as delivered.
    pub async fn mark_sent(&self, notification_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_notifications
             SET status = 'sent', sent_at = datetime('now', 'localtime')
             WHERE id = ?",
        )
        .bind(notification_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a notification as failed with the error text.
    pub async fn mark_failed(&self, notification_id: i64, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_notifications
             SET status = 'failed', error_message = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancel a still-pending notification. Returns true if it was pending.
    pub async fn cancel(&self, notification_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_notifications
             SET status = 'cancelled'
             WHERE id = ? AND status = 'pending'",
        )
        .bind(notification_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
