//! Driver location models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request payload for a single high-frequency driver position ping.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverLocationRequest {
    pub driver_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    pub accuracy: Option<f64>,
}

/// A driver position as delivered to live subscribers and the history read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPosition {
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_ping() -> UpdateDriverLocationRequest {
        UpdateDriverLocationRequest {
            driver_id: Uuid::new_v4(),
            latitude: 19.0596,
            longitude: 72.8295,
            heading: Some(90.0),
            speed: Some(8.3),
            accuracy: Some(5.0),
        }
    }

    #[test]
    fn test_valid_ping() {
        assert!(valid_ping().validate().is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        let mut ping = valid_ping();
        ping.latitude = 90.5;
        assert!(ping.validate().is_err());
    }

    #[test]
    fn test_invalid_longitude() {
        let mut ping = valid_ping();
        ping.longitude = -180.5;
        assert!(ping.validate().is_err());
    }

    #[test]
    fn test_negative_speed() {
        let mut ping = valid_ping();
        ping.speed = Some(-1.0);
        assert!(ping.validate().is_err());
    }

    #[test]
    fn test_optional_fields_absent() {
        let mut ping = valid_ping();
        ping.heading = None;
        ping.speed = None;
        ping.accuracy = None;
        assert!(ping.validate().is_ok());
    }
}
