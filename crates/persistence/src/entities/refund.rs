//! Refund entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the refunds table.
#[derive(Debug, Clone, FromRow)]
pub struct RefundEntity {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<RefundEntity> for domain::models::Refund {
    fn from(entity: RefundEntity) -> Self {
        Self {
            id: entity.id,
            payment_id: entity.payment_id,
            amount: entity.amount,
            reason: entity.reason,
            created_at: entity.created_at,
        }
    }
}
