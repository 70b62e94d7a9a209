//! Surge zone model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A demand zone with a fare multiplier.
///
/// The polygon is an ordered [lat, lng] ring; zones without geometry act as
/// region-wide defaults when active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeZone {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<[f64; 2]>>,
    pub multiplier: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surge_zone_serde() {
        let zone = SurgeZone {
            id: Uuid::new_v4(),
            name: "bandra-peak".to_string(),
            polygon: Some(vec![
                [19.05, 72.82],
                [19.05, 72.84],
                [19.07, 72.84],
                [19.07, 72.82],
            ]),
            multiplier: 1.2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["multiplier"], 1.2);
        assert_eq!(json["isActive"], true);
    }
}
