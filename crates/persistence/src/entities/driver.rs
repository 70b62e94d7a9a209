//! Driver entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{DriverStatus, RideType};

/// Database row mapping for the drivers table.
#[derive(Debug, Clone, FromRow)]
pub struct DriverEntity {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub vehicle_type: String,
    pub rating: f64,
    pub acceptance_rate: f64,
    pub status: String,
    pub total_trips: i64,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DriverEntity> for domain::models::Driver {
    fn from(entity: DriverEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            phone: entity.phone,
            vehicle_model: entity.vehicle_model,
            vehicle_plate: entity.vehicle_plate,
            vehicle_type: entity
                .vehicle_type
                .parse::<RideType>()
                .unwrap_or(RideType::Standard),
            rating: entity.rating,
            acceptance_rate: entity.acceptance_rate,
            status: entity
                .status
                .parse::<DriverStatus>()
                .unwrap_or(DriverStatus::Offline),
            total_trips: entity.total_trips,
            last_latitude: entity.last_latitude,
            last_longitude: entity.last_longitude,
            last_location_update: entity.last_location_update,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
