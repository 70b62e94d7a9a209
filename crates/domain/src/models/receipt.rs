//! Trip receipt model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A receipt issued to the rider when a trip completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub fare_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub issued_at: DateTime<Utc>,
}
