//! Ride entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{CancelledBy, RideStatus, RideType};

/// Database row mapping for the rides table.
#[derive(Debug, Clone, FromRow)]
pub struct RideEntity {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: Option<String>,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_address: Option<String>,
    pub ride_type: String,
    pub status: String,
    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_secs: i64,
    pub surge_multiplier: f64,
    pub matched_at: Option<DateTime<Utc>>,
    pub search_attempts: i32,
    pub idempotency_key: Option<String>,
    pub payment_method_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_fee: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RideEntity> for domain::models::Ride {
    fn from(entity: RideEntity) -> Self {
        Self {
            id: entity.id,
            rider_id: entity.rider_id,
            driver_id: entity.driver_id,
            pickup_latitude: entity.pickup_latitude,
            pickup_longitude: entity.pickup_longitude,
            pickup_address: entity.pickup_address,
            dropoff_latitude: entity.dropoff_latitude,
            dropoff_longitude: entity.dropoff_longitude,
            dropoff_address: entity.dropoff_address,
            ride_type: entity
                .ride_type
                .parse::<RideType>()
                .unwrap_or(RideType::Standard),
            status: entity
                .status
                .parse::<RideStatus>()
                .unwrap_or(RideStatus::Failed),
            estimated_fare: entity.estimated_fare,
            estimated_distance_km: entity.estimated_distance_km,
            estimated_duration_secs: entity.estimated_duration_secs,
            surge_multiplier: entity.surge_multiplier,
            matched_at: entity.matched_at,
            search_attempts: entity.search_attempts,
            idempotency_key: entity.idempotency_key,
            payment_method_id: entity.payment_method_id,
            scheduled_at: entity.scheduled_at,
            cancelled_by: entity
                .cancelled_by
                .as_deref()
                .and_then(|s| s.parse::<CancelledBy>().ok()),
            cancellation_reason: entity.cancellation_reason,
            cancellation_fee: entity.cancellation_fee,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_ride_entity() -> RideEntity {
        RideEntity {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id: None,
            pickup_latitude: 19.0596,
            pickup_longitude: 72.8295,
            pickup_address: Some("Bandra West".to_string()),
            dropoff_latitude: 19.0760,
            dropoff_longitude: 72.8777,
            dropoff_address: None,
            ride_type: "STANDARD".to_string(),
            status: "SEARCHING".to_string(),
            estimated_fare: 233.28,
            estimated_distance_km: 5.4,
            estimated_duration_secs: 648,
            surge_multiplier: 1.2,
            matched_at: None,
            search_attempts: 0,
            idempotency_key: Some("req-1".to_string()),
            payment_method_id: None,
            scheduled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            cancellation_fee: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ride_entity_to_domain() {
        let entity = create_test_ride_entity();
        let ride: domain::models::Ride = entity.clone().into();
        assert_eq!(ride.status, RideStatus::Searching);
        assert_eq!(ride.ride_type, RideType::Standard);
        assert_eq!(ride.surge_multiplier, 1.2);
        assert!(ride.cancelled_by.is_none());
    }

    #[test]
    fn test_cancelled_by_parses() {
        let mut entity = create_test_ride_entity();
        entity.status = "CANCELLED".to_string();
        entity.cancelled_by = Some("rider".to_string());
        let ride: domain::models::Ride = entity.into();
        assert_eq!(ride.status, RideStatus::Cancelled);
        assert_eq!(ride.cancelled_by, Some(CancelledBy::Rider));
    }
}
