//! Trip domain model: the execution phase of a ride.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::ride::LocationPoint;

/// State of a trip in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Pending,
    Started,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "PENDING",
            TripStatus::Started => "STARTED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: TripStatus) -> bool {
        matches!(
            (self, target),
            (TripStatus::Pending, TripStatus::Started)
                | (TripStatus::Pending, TripStatus::Cancelled)
                | (TripStatus::Started, TripStatus::Completed)
                | (TripStatus::Started, TripStatus::Cancelled)
        )
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TripStatus::Pending),
            "STARTED" => Ok(TripStatus::Started),
            "COMPLETED" => Ok(TripStatus::Completed),
            "CANCELLED" => Ok(TripStatus::Cancelled),
            _ => Err(format!(
                "Invalid trip status: {}. Must be one of: PENDING, STARTED, COMPLETED, CANCELLED",
                s
            )),
        }
    }
}

/// Represents a trip record.
///
/// Pricing inputs are frozen when the trip row is created so a later pricing
/// change never alters an in-flight fare. Fare components stay unset until
/// completion. Invariant: platformFee + driverEarnings = finalFare.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub status: TripStatus,
    /// 4-digit code the rider reads to the driver at pickup.
    pub start_otp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_distance_km: Option<f64>,
    /// Ordered [lat, lng] samples of the driven route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_path: Option<Vec<[f64; 2]>>,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub surge_multiplier: f64,
    pub discount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_fare: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_fare: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surge_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_fare: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_earnings: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for starting a trip at pickup.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartTripRequest {
    pub trip_id: Uuid,

    #[validate(length(equal = 4, message = "OTP must be exactly 4 digits"))]
    pub start_otp: String,
}

/// Request payload for ending a trip at dropoff.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EndTripRequest {
    pub trip_id: Uuid,

    #[validate(nested)]
    pub end_location: LocationPoint,

    #[validate(range(min = 0.0, message = "Distance must be non-negative"))]
    pub actual_distance_km: f64,

    pub route_path: Option<Vec<[f64; 2]>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_trip_status_roundtrip() {
        for status in [
            TripStatus::Pending,
            TripStatus::Started,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            assert_eq!(TripStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(TripStatus::from_str("PAUSED").is_err());
    }

    #[test]
    fn test_trip_transitions() {
        assert!(TripStatus::Pending.can_transition_to(TripStatus::Started));
        assert!(TripStatus::Started.can_transition_to(TripStatus::Completed));
        assert!(TripStatus::Pending.can_transition_to(TripStatus::Cancelled));
        assert!(TripStatus::Started.can_transition_to(TripStatus::Cancelled));

        assert!(!TripStatus::Pending.can_transition_to(TripStatus::Completed));
        assert!(!TripStatus::Completed.can_transition_to(TripStatus::Started));
        assert!(!TripStatus::Cancelled.can_transition_to(TripStatus::Started));
    }

    #[test]
    fn test_start_trip_request_otp_length() {
        let request = StartTripRequest {
            trip_id: Uuid::new_v4(),
            start_otp: "1234".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = StartTripRequest {
            trip_id: Uuid::new_v4(),
            start_otp: "123".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_end_trip_request_negative_distance() {
        let request = EndTripRequest {
            trip_id: Uuid::new_v4(),
            end_location: LocationPoint {
                lat: 19.076,
                lng: 72.8777,
                address: None,
            },
            actual_distance_km: -1.0,
            route_path: None,
        };
        assert!(request.validate().is_err());
    }
}
