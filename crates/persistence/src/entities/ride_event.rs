//! Ride event entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the append-only ride_events table.
#[derive(Debug, Clone, FromRow)]
pub struct RideEventEntity {
    pub id: i64,
    pub ride_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
