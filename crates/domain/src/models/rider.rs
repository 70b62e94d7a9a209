//! Rider domain model.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidationError;

lazy_static! {
    /// E.164-ish phone format: optional +, 8-15 digits.
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[1-9]\d{7,14}$").expect("valid phone regex");
}

/// Validates a rider or driver contact phone number.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone must be 8-15 digits with optional leading +".into());
        Err(err)
    }
}

/// Represents a rider account.
///
/// Riders are created out-of-band; the engine only mutates the aggregate
/// rating and lifetime ride count when completing a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub rating: f64,
    pub total_rides: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
