//! Earning entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the earnings table.
#[derive(Debug, Clone, FromRow)]
pub struct EarningEntity {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub trip_id: Uuid,
    pub amount: f64,
    pub platform_fee: f64,
    pub created_at: DateTime<Utc>,
}

impl From<EarningEntity> for domain::models::Earning {
    fn from(entity: EarningEntity) -> Self {
        Self {
            id: entity.id,
            driver_id: entity.driver_id,
            trip_id: entity.trip_id,
            amount: entity.amount,
            platform_fee: entity.platform_fee,
            created_at: entity.created_at,
        }
    }
}
