//! Driver location entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the driver_locations table.
#[derive(Debug, Clone, FromRow)]
pub struct DriverLocationEntity {
    pub id: i64,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f32>,  // REAL (FLOAT4) in PostgreSQL
    pub speed: Option<f32>,    // REAL (FLOAT4) in PostgreSQL
    pub accuracy: Option<f32>, // REAL (FLOAT4) in PostgreSQL
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DriverLocationEntity> for domain::models::DriverPosition {
    fn from(entity: DriverLocationEntity) -> Self {
        Self {
            driver_id: entity.driver_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            heading: entity.heading.map(|h| h as f64),
            speed: entity.speed.map(|s| s as f64),
            accuracy: entity.accuracy.map(|a| a as f64),
            recorded_at: entity.recorded_at,
        }
    }
}
