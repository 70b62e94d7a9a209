//! User-visible notification model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who a notification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    Rider,
    Driver,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientRole::Rider => "RIDER",
            RecipientRole::Driver => "DRIVER",
        }
    }
}

impl std::str::FromStr for RecipientRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RIDER" => Ok(RecipientRole::Rider),
            "DRIVER" => Ok(RecipientRole::Driver),
            _ => Err(format!("Invalid recipient role: {}", s)),
        }
    }
}

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    DriverArriving,
    ArrivalOtp,
    RideCompleted,
    RideCancelled,
    RideFailed,
    PaymentSuccess,
    PaymentFailed,
    RefundIssued,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DriverArriving => "DRIVER_ARRIVING",
            NotificationKind::ArrivalOtp => "ARRIVAL_OTP",
            NotificationKind::RideCompleted => "RIDE_COMPLETED",
            NotificationKind::RideCancelled => "RIDE_CANCELLED",
            NotificationKind::RideFailed => "RIDE_FAILED",
            NotificationKind::PaymentSuccess => "PAYMENT_SUCCESS",
            NotificationKind::PaymentFailed => "PAYMENT_FAILED",
            NotificationKind::RefundIssued => "REFUND_ISSUED",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRIVER_ARRIVING" => Ok(NotificationKind::DriverArriving),
            "ARRIVAL_OTP" => Ok(NotificationKind::ArrivalOtp),
            "RIDE_COMPLETED" => Ok(NotificationKind::RideCompleted),
            "RIDE_CANCELLED" => Ok(NotificationKind::RideCancelled),
            "RIDE_FAILED" => Ok(NotificationKind::RideFailed),
            "PAYMENT_SUCCESS" => Ok(NotificationKind::PaymentSuccess),
            "PAYMENT_FAILED" => Ok(NotificationKind::PaymentFailed),
            "REFUND_ISSUED" => Ok(NotificationKind::RefundIssued),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

/// A durable user-visible event. Append-only from the engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_role: RecipientRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
