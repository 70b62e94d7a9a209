//! Driver domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ride::RideType;

/// Availability status of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Offline,
    Available,
    OnRide,
    Break,
}

impl DriverStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Offline => "OFFLINE",
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::OnRide => "ON_RIDE",
            DriverStatus::Break => "BREAK",
        }
    }

    /// Whether a driver in this status needs live location tracking.
    ///
    /// AVAILABLE drivers feed the geo index for matching; ON_RIDE drivers feed
    /// the rider's live map.
    pub fn tracks_location(&self) -> bool {
        matches!(self, DriverStatus::Available | DriverStatus::OnRide)
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFLINE" => Ok(DriverStatus::Offline),
            "AVAILABLE" => Ok(DriverStatus::Available),
            "ON_RIDE" => Ok(DriverStatus::OnRide),
            "BREAK" => Ok(DriverStatus::Break),
            _ => Err(format!(
                "Invalid driver status: {}. Must be one of: OFFLINE, AVAILABLE, ON_RIDE, BREAK",
                s
            )),
        }
    }
}

/// Represents a driver account with vehicle descriptor and aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub vehicle_type: RideType,
    pub rating: f64,
    pub acceptance_rate: f64,
    pub status: DriverStatus,
    pub total_trips: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_location_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Last known position, if the driver has ever pinged.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.last_latitude, self.last_longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Request payload for a driver availability change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverAvailabilityRequest {
    pub driver_id: Uuid,
    pub status: DriverStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn create_test_driver() -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: "Ravi Kumar".to_string(),
            phone: "+919820054321".to_string(),
            vehicle_model: "Maruti Dzire".to_string(),
            vehicle_plate: "MH01AB1234".to_string(),
            vehicle_type: RideType::Standard,
            rating: 4.9,
            acceptance_rate: 0.93,
            status: DriverStatus::Available,
            total_trips: 2150,
            last_latitude: Some(19.0596),
            last_longitude: Some(72.8295),
            last_location_update: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_driver_status_roundtrip() {
        for status in [
            DriverStatus::Offline,
            DriverStatus::Available,
            DriverStatus::OnRide,
            DriverStatus::Break,
        ] {
            assert_eq!(DriverStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_driver_status_invalid() {
        assert!(DriverStatus::from_str("BUSY").is_err());
    }

    #[test]
    fn test_tracks_location() {
        assert!(DriverStatus::Available.tracks_location());
        assert!(DriverStatus::OnRide.tracks_location());
        assert!(!DriverStatus::Offline.tracks_location());
        assert!(!DriverStatus::Break.tracks_location());
    }

    #[test]
    fn test_driver_position() {
        let driver = create_test_driver();
        assert_eq!(driver.position(), Some((19.0596, 72.8295)));

        let mut no_pos = create_test_driver();
        no_pos.last_latitude = None;
        assert_eq!(no_pos.position(), None);
    }
}
