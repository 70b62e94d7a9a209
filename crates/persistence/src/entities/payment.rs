//! Payment entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::PaymentStatus;

/// Database row mapping for the payments table.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub amount: f64,
    pub status: String,
    pub psp_transaction_id: Option<String>,
    pub payment_method_id: String,
    pub idempotency_key: String,
    pub attempts: i32,
    pub refunded_amount: f64,
    pub failure_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentEntity> for domain::models::Payment {
    fn from(entity: PaymentEntity) -> Self {
        Self {
            id: entity.id,
            trip_id: entity.trip_id,
            amount: entity.amount,
            status: entity
                .status
                .parse::<PaymentStatus>()
                .unwrap_or(PaymentStatus::Pending),
            psp_transaction_id: entity.psp_transaction_id,
            payment_method_id: entity.payment_method_id,
            idempotency_key: entity.idempotency_key,
            attempts: entity.attempts,
            refunded_amount: entity.refunded_amount,
            failure_reason: entity.failure_reason,
            completed_at: entity.completed_at,
            failed_at: entity.failed_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_entity_to_domain() {
        let entity = PaymentEntity {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            amount: 233.28,
            status: "COMPLETED".to_string(),
            psp_transaction_id: Some("psp_abc".to_string()),
            payment_method_id: "pm_card_1".to_string(),
            idempotency_key: "pay-1".to_string(),
            attempts: 2,
            refunded_amount: 0.0,
            failure_reason: None,
            completed_at: Some(Utc::now()),
            failed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let payment: domain::models::Payment = entity.clone().into();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.attempts, 2);
        assert_eq!(payment.amount, 233.28);
    }
}
