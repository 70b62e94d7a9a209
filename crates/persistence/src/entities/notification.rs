//! Notification entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{NotificationKind, RecipientRole};

/// Database row mapping for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_role: String,
    pub ride_id: Option<Uuid>,
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationEntity> for domain::models::Notification {
    fn from(entity: NotificationEntity) -> Self {
        Self {
            id: entity.id,
            recipient_id: entity.recipient_id,
            recipient_role: entity
                .recipient_role
                .parse::<RecipientRole>()
                .unwrap_or(RecipientRole::Rider),
            ride_id: entity.ride_id,
            kind: entity
                .kind
                .parse::<NotificationKind>()
                .unwrap_or(NotificationKind::RideCompleted),
            message: entity.message,
            created_at: entity.created_at,
        }
    }
}
