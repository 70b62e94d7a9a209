//! Surge zone entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the surge_zones table.
#[derive(Debug, Clone, FromRow)]
pub struct SurgeZoneEntity {
    pub id: Uuid,
    pub name: String,
    pub polygon: Option<serde_json::Value>,
    pub multiplier: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SurgeZoneEntity> for domain::models::SurgeZone {
    fn from(entity: SurgeZoneEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            polygon: entity.polygon.and_then(|v| serde_json::from_value(v).ok()),
            multiplier: entity.multiplier,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_parses_from_jsonb() {
        let entity = SurgeZoneEntity {
            id: Uuid::new_v4(),
            name: "bandra-peak".to_string(),
            polygon: Some(serde_json::json!([[19.05, 72.82], [19.05, 72.84], [19.07, 72.83]])),
            multiplier: 1.2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let zone: domain::models::SurgeZone = entity.into();
        assert_eq!(zone.polygon.as_ref().map(|p| p.len()), Some(3));
    }

    #[test]
    fn test_malformed_polygon_becomes_none() {
        let entity = SurgeZoneEntity {
            id: Uuid::new_v4(),
            name: "broken".to_string(),
            polygon: Some(serde_json::json!({"not": "a ring"})),
            multiplier: 1.0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let zone: domain::models::SurgeZone = entity.into();
        assert!(zone.polygon.is_none());
    }
}
