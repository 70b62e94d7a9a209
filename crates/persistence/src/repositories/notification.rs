//! Notification repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::NotificationEntity;
use domain::models::{NotificationKind, RecipientRole};

/// Input data for inserting a notification.
#[derive(Debug, Clone)]
pub struct NotificationInput {
    pub recipient_id: Uuid,
    pub recipient_role: RecipientRole,
    pub ride_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
}

/// Repository for notification database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a notification.
    pub async fn insert(
        &self,
        input: NotificationInput,
    ) -> Result<NotificationEntity, sqlx::Error> {
        sqlx::query_as::<_, NotificationEntity>(
            r#"
            INSERT INTO notifications (recipient_id, recipient_role, ride_id, kind, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, recipient_id, recipient_role, ride_id, kind, message, created_at
            "#,
        )
        .bind(input.recipient_id)
        .bind(input.recipient_role.as_str())
        .bind(input.ride_id)
        .bind(input.kind.as_str())
        .bind(&input.message)
        .fetch_one(&self.pool)
        .await
    }

    /// Most recent notifications for a recipient.
    pub async fn list_for_recipient(
        &self,
        recipient_id: Uuid,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, sqlx::Error> {
        sqlx::query_as::<_, NotificationEntity>(
            r#"
            SELECT id, recipient_id, recipient_role, ride_id, kind, message, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
