//! Receipt entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the receipts table.
#[derive(Debug, Clone, FromRow)]
pub struct ReceiptEntity {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub fare_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub issued_at: DateTime<Utc>,
}

impl From<ReceiptEntity> for domain::models::Receipt {
    fn from(entity: ReceiptEntity) -> Self {
        Self {
            id: entity.id,
            trip_id: entity.trip_id,
            rider_id: entity.rider_id,
            fare_amount: entity.fare_amount,
            tax_amount: entity.tax_amount,
            total_amount: entity.total_amount,
            issued_at: entity.issued_at,
        }
    }
}
