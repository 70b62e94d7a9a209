//! Rider entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the riders table.
#[derive(Debug, Clone, FromRow)]
pub struct RiderEntity {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub rating: f64,
    pub total_rides: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RiderEntity> for domain::models::Rider {
    fn from(entity: RiderEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
            email: entity.email,
            rating: entity.rating,
            total_rides: entity.total_rides,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
