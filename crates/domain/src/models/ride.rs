//! Ride domain model and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Vehicle tier requested for a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideType {
    Auto,
    Standard,
    Premium,
    Xl,
}

impl RideType {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RideType::Auto => "AUTO",
            RideType::Standard => "STANDARD",
            RideType::Premium => "PREMIUM",
            RideType::Xl => "XL",
        }
    }
}

impl fmt::Display for RideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RideType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO" => Ok(RideType::Auto),
            "STANDARD" => Ok(RideType::Standard),
            "PREMIUM" => Ok(RideType::Premium),
            "XL" => Ok(RideType::Xl),
            _ => Err(format!(
                "Invalid ride type: {}. Must be one of: AUTO, STANDARD, PREMIUM, XL",
                s
            )),
        }
    }
}

/// Status of a ride in its lifecycle.
///
/// SEARCHING → MATCHED → DRIVER_ARRIVING → ARRIVED → IN_PROGRESS → COMPLETED,
/// with CANCELLED reachable from every non-terminal state except IN_PROGRESS
/// and FAILED reachable from SEARCHING when matching exhausts its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Searching,
    Matched,
    DriverArriving,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl RideStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Searching => "SEARCHING",
            RideStatus::Matched => "MATCHED",
            RideStatus::DriverArriving => "DRIVER_ARRIVING",
            RideStatus::Arrived => "ARRIVED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
            RideStatus::Failed => "FAILED",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Failed
        )
    }

    /// Whether a ride in this status can be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            RideStatus::Searching
                | RideStatus::Matched
                | RideStatus::DriverArriving
                | RideStatus::Arrived
        )
    }

    /// Whether a ride in this status has a matched driver.
    pub fn has_driver(&self) -> bool {
        matches!(
            self,
            RideStatus::Matched
                | RideStatus::DriverArriving
                | RideStatus::Arrived
                | RideStatus::InProgress
                | RideStatus::Completed
        )
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: RideStatus) -> bool {
        match (self, target) {
            (RideStatus::Searching, RideStatus::Matched) => true,
            (RideStatus::Searching, RideStatus::Failed) => true,
            (RideStatus::Matched, RideStatus::DriverArriving) => true,
            (RideStatus::DriverArriving, RideStatus::Arrived) => true,
            (RideStatus::Arrived, RideStatus::InProgress) => true,
            (RideStatus::InProgress, RideStatus::Completed) => true,
            (from, RideStatus::Cancelled) => from.is_cancellable(),
            _ => false,
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEARCHING" => Ok(RideStatus::Searching),
            "MATCHED" => Ok(RideStatus::Matched),
            "DRIVER_ARRIVING" => Ok(RideStatus::DriverArriving),
            "ARRIVED" => Ok(RideStatus::Arrived),
            "IN_PROGRESS" => Ok(RideStatus::InProgress),
            "COMPLETED" => Ok(RideStatus::Completed),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            "FAILED" => Ok(RideStatus::Failed),
            _ => Err(format!("Invalid ride status: {}", s)),
        }
    }
}

/// Who initiated a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Rider,
    Driver,
    System,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Rider => "rider",
            CancelledBy::Driver => "driver",
            CancelledBy::System => "system",
        }
    }
}

impl std::str::FromStr for CancelledBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(CancelledBy::Rider),
            "driver" => Ok(CancelledBy::Driver),
            "system" => Ok(CancelledBy::System),
            _ => Err(format!(
                "Invalid canceller: {}. Must be one of: rider, driver, system",
                s
            )),
        }
    }
}

/// A pickup or dropoff point.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationPoint {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub lat: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub lng: f64,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,
}

/// Represents a ride: a rider's request for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_address: Option<String>,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropoff_address: Option<String>,
    pub ride_type: RideType,
    pub status: RideStatus,
    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_secs: i64,
    pub surge_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_at: Option<DateTime<Utc>>,
    pub search_attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelledBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Cancellation fee in whole rupees; metadata only, never charged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_fee: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a ride.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub rider_id: Uuid,

    #[validate(nested)]
    pub pickup: LocationPoint,

    #[validate(nested)]
    pub dropoff: LocationPoint,

    pub ride_type: RideType,

    pub payment_method_id: Option<String>,

    /// Accepted and stored; future-scheduled rides are not dispatched.
    pub scheduled_at: Option<DateTime<Utc>>,

    #[validate(length(min = 1, max = 128, message = "Idempotency key must be 1-128 characters"))]
    pub idempotency_key: String,
}

/// Request payload for cancelling a ride.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelRideRequest {
    pub ride_id: Uuid,

    pub cancelled_by: CancelledBy,

    #[validate(length(max = 255, message = "Reason must be at most 255 characters"))]
    pub reason: Option<String>,
}

/// Response payload for a driver accepting a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRideResponse {
    pub ride_id: Uuid,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ALL_STATUSES: [RideStatus; 8] = [
        RideStatus::Searching,
        RideStatus::Matched,
        RideStatus::DriverArriving,
        RideStatus::Arrived,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
        RideStatus::Failed,
    ];

    #[test]
    fn test_status_roundtrip() {
        for status in ALL_STATUSES {
            assert_eq!(RideStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(RideStatus::Searching.can_transition_to(RideStatus::Matched));
        assert!(RideStatus::Matched.can_transition_to(RideStatus::DriverArriving));
        assert!(RideStatus::DriverArriving.can_transition_to(RideStatus::Arrived));
        assert!(RideStatus::Arrived.can_transition_to(RideStatus::InProgress));
        assert!(RideStatus::InProgress.can_transition_to(RideStatus::Completed));
    }

    #[test]
    fn test_cancel_reachability() {
        assert!(RideStatus::Searching.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::Matched.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::DriverArriving.can_transition_to(RideStatus::Cancelled));
        assert!(RideStatus::Arrived.can_transition_to(RideStatus::Cancelled));
        // IN_PROGRESS rides can only complete.
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Failed.can_transition_to(RideStatus::Cancelled));
    }

    #[test]
    fn test_failed_only_from_searching() {
        assert!(RideStatus::Searching.can_transition_to(RideStatus::Failed));
        for status in ALL_STATUSES {
            if status != RideStatus::Searching {
                assert!(
                    !status.can_transition_to(RideStatus::Failed),
                    "{} -> FAILED should be illegal",
                    status
                );
            }
        }
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!RideStatus::Searching.can_transition_to(RideStatus::DriverArriving));
        assert!(!RideStatus::Searching.can_transition_to(RideStatus::InProgress));
        assert!(!RideStatus::Matched.can_transition_to(RideStatus::Arrived));
        assert!(!RideStatus::Matched.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::Arrived.can_transition_to(RideStatus::Completed));
    }

    #[test]
    fn test_terminal_states_are_sinks() {
        for terminal in [
            RideStatus::Completed,
            RideStatus::Cancelled,
            RideStatus::Failed,
        ] {
            assert!(terminal.is_terminal());
            for target in ALL_STATUSES {
                assert!(
                    !terminal.can_transition_to(target),
                    "{} -> {} should be illegal",
                    terminal,
                    target
                );
            }
        }
    }

    #[test]
    fn test_has_driver() {
        assert!(!RideStatus::Searching.has_driver());
        assert!(RideStatus::Matched.has_driver());
        assert!(RideStatus::InProgress.has_driver());
        assert!(RideStatus::Completed.has_driver());
    }

    #[test]
    fn test_ride_type_roundtrip() {
        for ride_type in [
            RideType::Auto,
            RideType::Standard,
            RideType::Premium,
            RideType::Xl,
        ] {
            assert_eq!(RideType::from_str(ride_type.as_str()).unwrap(), ride_type);
        }
        assert!(RideType::from_str("HELICOPTER").is_err());
    }

    #[test]
    fn test_create_ride_request_validation() {
        let request = CreateRideRequest {
            rider_id: Uuid::new_v4(),
            pickup: LocationPoint {
                lat: 19.0596,
                lng: 72.8295,
                address: Some("Bandra West".to_string()),
            },
            dropoff: LocationPoint {
                lat: 19.0760,
                lng: 72.8777,
                address: None,
            },
            ride_type: RideType::Standard,
            payment_method_id: None,
            scheduled_at: None,
            idempotency_key: "req-1".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_ride_request_bad_pickup() {
        let request = CreateRideRequest {
            rider_id: Uuid::new_v4(),
            pickup: LocationPoint {
                lat: 91.0,
                lng: 72.8295,
                address: None,
            },
            dropoff: LocationPoint {
                lat: 19.0760,
                lng: 72.8777,
                address: None,
            },
            ride_type: RideType::Standard,
            payment_method_id: None,
            scheduled_at: None,
            idempotency_key: "req-1".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_ride_request_empty_key() {
        let request = CreateRideRequest {
            rider_id: Uuid::new_v4(),
            pickup: LocationPoint {
                lat: 19.0596,
                lng: 72.8295,
                address: None,
            },
            dropoff: LocationPoint {
                lat: 19.0760,
                lng: 72.8777,
                address: None,
            },
            ride_type: RideType::Standard,
            payment_method_id: None,
            scheduled_at: None,
            idempotency_key: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cancelled_by_roundtrip() {
        for by in [CancelledBy::Rider, CancelledBy::Driver, CancelledBy::System] {
            assert_eq!(CancelledBy::from_str(by.as_str()).unwrap(), by);
        }
        assert!(CancelledBy::from_str("ops").is_err());
    }
}
