//! Trip entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::TripStatus;

/// Database row mapping for the trips table.
#[derive(Debug, Clone, FromRow)]
pub struct TripEntity {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub status: String,
    pub start_otp: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub actual_distance_km: Option<f64>,
    pub route_path: Option<serde_json::Value>,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub surge_multiplier: f64,
    pub discount: f64,
    pub distance_fare: Option<f64>,
    pub time_fare: Option<f64>,
    pub surge_amount: Option<f64>,
    pub final_fare: Option<f64>,
    pub platform_fee: Option<f64>,
    pub driver_earnings: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TripEntity> for domain::models::Trip {
    fn from(entity: TripEntity) -> Self {
        Self {
            id: entity.id,
            ride_id: entity.ride_id,
            driver_id: entity.driver_id,
            status: entity
                .status
                .parse::<TripStatus>()
                .unwrap_or(TripStatus::Pending),
            start_otp: entity.start_otp,
            start_time: entity.start_time,
            end_time: entity.end_time,
            actual_distance_km: entity.actual_distance_km,
            route_path: entity
                .route_path
                .and_then(|v| serde_json::from_value(v).ok()),
            base_fare: entity.base_fare,
            per_km_rate: entity.per_km_rate,
            per_min_rate: entity.per_min_rate,
            surge_multiplier: entity.surge_multiplier,
            discount: entity.discount,
            distance_fare: entity.distance_fare,
            time_fare: entity.time_fare,
            surge_amount: entity.surge_amount,
            final_fare: entity.final_fare,
            platform_fee: entity.platform_fee,
            driver_earnings: entity.driver_earnings,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
