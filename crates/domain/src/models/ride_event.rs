//! Append-only ride audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Event type written for every ride state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideEventType {
    RideCreated,
    DriverMatched,
    MatchingFailed,
    DriverEnRoute,
    DriverArrived,
    TripStarted,
    TripCompleted,
    RideCancelled,
}

impl RideEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideEventType::RideCreated => "ride_created",
            RideEventType::DriverMatched => "driver_matched",
            RideEventType::MatchingFailed => "matching_failed",
            RideEventType::DriverEnRoute => "driver_en_route",
            RideEventType::DriverArrived => "driver_arrived",
            RideEventType::TripStarted => "trip_started",
            RideEventType::TripCompleted => "trip_completed",
            RideEventType::RideCancelled => "ride_cancelled",
        }
    }
}

impl fmt::Display for RideEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit record for one ride transition. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideEvent {
    pub id: i64,
    pub ride_id: Uuid,
    pub event_type: RideEventType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_strings() {
        assert_eq!(RideEventType::RideCreated.as_str(), "ride_created");
        assert_eq!(RideEventType::DriverMatched.as_str(), "driver_matched");
        assert_eq!(RideEventType::RideCancelled.as_str(), "ride_cancelled");
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let json = serde_json::to_string(&RideEventType::DriverEnRoute).unwrap();
        assert_eq!(json, "\"driver_en_route\"");
    }
}
