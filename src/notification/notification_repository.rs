use super::notification_models::{Notification, NotificationCategory, NotificationStatus};
use crate::error::Result;
use crate::feed::{ChangeEvent, NotificationSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;

/// PostgreSQL-backed notification store. Row changes are observed through the
/// `notifications_changed` trigger and fanned out on the broadcast channel
/// held here, so subscribers see writes from any connection, not just this
/// process.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl NotificationRepository {
    pub fn new(pool: PgPool, change_tx: broadcast::Sender<ChangeEvent>) -> Self {
        Self { pool, change_tx }
    }

    pub async fn find_active(&self) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE status = 'active' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn find_all(&self) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn create(
        &self,
        title: &str,
        message: &str,
        category: NotificationCategory,
        audience: &str,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (title, message, category, audience, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(title)
        .bind(message)
        .bind(category)
        .bind(audience)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    pub async fn set_status(
        &self,
        id: i64,
        status: NotificationStatus,
    ) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    pub async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deactivate active rows whose end date has passed. Returns how many
    /// rows changed; each change raises the table trigger, so connected
    /// feeds refresh on their own.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'inactive'
             WHERE status = 'active' AND end_date IS NOT NULL AND end_date < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationSource for NotificationRepository {
    async fn fetch_active(&self) -> Result<Vec<Notification>> {
        self.find_active().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }
}
