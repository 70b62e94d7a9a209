//! Driver earning model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A driver's take for one completed trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earning {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub trip_id: Uuid,
    pub amount: f64,
    pub platform_fee: f64,
    pub created_at: DateTime<Utc>,
}
