//! Pricing config entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::RideType;

/// Database row mapping for the pricing_configs table.
#[derive(Debug, Clone, FromRow)]
pub struct PricingConfigEntity {
    pub id: Uuid,
    pub region: String,
    pub ride_type: String,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PricingConfigEntity> for domain::models::PricingConfig {
    fn from(entity: PricingConfigEntity) -> Self {
        Self {
            id: entity.id,
            region: entity.region,
            ride_type: entity
                .ride_type
                .parse::<RideType>()
                .unwrap_or(RideType::Standard),
            base_fare: entity.base_fare,
            per_km_rate: entity.per_km_rate,
            per_min_rate: entity.per_min_rate,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
