//! Per-region pricing configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ride::RideType;

/// Active pricing row for a (region, tier) tuple.
///
/// Read-only from the engine's perspective; rates are frozen onto the trip
/// when it is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingConfig {
    pub id: Uuid,
    pub region: String,
    pub ride_type: RideType,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_config_serde() {
        let config = PricingConfig {
            id: Uuid::new_v4(),
            region: "mumbai".to_string(),
            ride_type: RideType::Standard,
            base_fare: 50.0,
            per_km_rate: 12.0,
            per_min_rate: 2.0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["region"], "mumbai");
        assert_eq!(json["rideType"], "STANDARD");
        assert_eq!(json["baseFare"], 50.0);
    }
}
