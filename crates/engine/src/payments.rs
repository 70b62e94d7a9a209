//! Idempotent payment settlement.
//!
//! `process` follows one fixed order: idempotency replay, trip gate,
//! completed-payment short-circuit, PENDING upsert, gateway charge, terminal
//! update, notification, response caching. Retries and refunds ride on the
//! same payment row; a trip never ends up with two COMPLETED payments.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::idempotency::IdempotencyStore;
use domain::models::{
    NotificationKind, Payment, PaymentStatus, ProcessPaymentRequest, RecipientRole,
    RefundPaymentRequest, RefundPaymentResponse, TripStatus,
};
use domain::services::{ChargeOutcome, PaymentGateway};
use persistence::entities::{PaymentEntity, TripEntity};
use persistence::repositories::{
    NotificationInput, NotificationRepository, PaymentInput, PaymentRepository, RideRepository,
    TripRepository,
};
use validator::Validate;

/// Payment operations of the ride engine.
#[derive(Clone)]
pub struct PaymentProcessor {
    config: Arc<EngineConfig>,
    gateway: Arc<dyn PaymentGateway>,
    idempotency: Arc<IdempotencyStore>,
    payments: PaymentRepository,
    trips: TripRepository,
    rides: RideRepository,
    notifications: NotificationRepository,
}

impl PaymentProcessor {
    pub fn new(
        config: Arc<EngineConfig>,
        gateway: Arc<dyn PaymentGateway>,
        idempotency: Arc<IdempotencyStore>,
        payments: PaymentRepository,
        trips: TripRepository,
        rides: RideRepository,
        notifications: NotificationRepository,
    ) -> Self {
        Self {
            config,
            gateway,
            idempotency,
            payments,
            trips,
            rides,
            notifications,
        }
    }

    /// Settle a completed trip, safe to retry under one idempotency key.
    pub async fn process(&self, request: ProcessPaymentRequest) -> Result<Payment, EngineError> {
        request.validate()?;

        let cache_key = format!("payment:{}", request.idempotency_key);
        if let Some(cached) = self.idempotency.get(&cache_key).await {
            info!(trip_id = %request.trip_id, "payment replayed from idempotency store");
            metrics::counter!("payments_replayed_total").increment(1);
            return serde_json::from_value(cached)
                .map_err(|e| EngineError::Internal(format!("corrupt cached payment: {}", e)));
        }

        let trip = self
            .trips
            .find_by_id(request.trip_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Trip not found".into()))?;

        if trip.status.parse::<TripStatus>() != Ok(TripStatus::Completed) {
            return Err(EngineError::Validation(
                "Payment requires a completed trip".into(),
            ));
        }
        let amount = trip.final_fare.ok_or_else(|| {
            EngineError::Internal("Completed trip is missing its final fare".into())
        })?;

        // At most one COMPLETED payment per trip.
        if let Some(existing) = self.payments.find_by_trip_id(request.trip_id).await? {
            if existing.status == PaymentStatus::Completed.as_str() {
                return Ok(existing.into());
            }
        }

        let pending = self
            .payments
            .upsert_pending(PaymentInput {
                trip_id: request.trip_id,
                amount,
                payment_method_id: request.payment_method_id.clone(),
                idempotency_key: request.idempotency_key.clone(),
            })
            .await?;

        let Some(pending) = pending else {
            // Lost the race to a concurrent completion; return the winner.
            let winner = self
                .payments
                .find_by_trip_id(request.trip_id)
                .await?
                .ok_or_else(|| EngineError::Internal("payment row vanished".into()))?;
            return Ok(winner.into());
        };

        let settled = self.charge_and_settle(&trip, pending).await?;
        let response: Payment = settled.into();

        let serialized = serde_json::to_value(&response)
            .map_err(|e| EngineError::Internal(format!("serialize payment: {}", e)))?;
        self.idempotency
            .set_if_absent(
                &cache_key,
                serialized,
                Duration::from_secs(self.config.payment_cache_ttl_secs),
            )
            .await;

        Ok(response)
    }

    /// Retry a FAILED payment, bounded by the attempts ceiling.
    pub async fn retry(&self, payment_id: Uuid) -> Result<Payment, EngineError> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Payment not found".into()))?;

        if payment.status != PaymentStatus::Failed.as_str() {
            return Err(EngineError::Validation(
                "Only failed payments can be retried".into(),
            ));
        }

        let pending = self
            .payments
            .begin_retry(payment_id, self.config.payment_max_attempts)
            .await?
            .ok_or_else(|| {
                EngineError::Conflict(format!(
                    "Payment exhausted its {} attempts",
                    self.config.payment_max_attempts
                ))
            })?;

        let trip = self
            .trips
            .find_by_id(pending.trip_id)
            .await?
            .ok_or_else(|| EngineError::Internal("Payment references a missing trip".into()))?;

        let settled = self.charge_and_settle(&trip, pending).await?;
        Ok(settled.into())
    }

    /// Refund part or all of a COMPLETED payment.
    pub async fn refund(
        &self,
        request: RefundPaymentRequest,
    ) -> Result<RefundPaymentResponse, EngineError> {
        request.validate()?;

        let payment = self
            .payments
            .find_by_id(request.payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Payment not found".into()))?;

        if payment.status != PaymentStatus::Completed.as_str() {
            return Err(EngineError::Validation(
                "Only completed payments can be refunded".into(),
            ));
        }

        let refundable = payment.amount - payment.refunded_amount;
        if request.amount > refundable + f64::EPSILON {
            return Err(EngineError::Validation(format!(
                "Refund {} exceeds refundable amount {}",
                request.amount, refundable
            )));
        }

        let full_refund = (refundable - request.amount).abs() < 0.005;
        let new_status = if full_refund {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };

        let (refund, updated) = self
            .payments
            .apply_refund(request.payment_id, request.amount, &request.reason, new_status)
            .await?;

        info!(
            payment_id = %request.payment_id,
            refund_id = %refund.id,
            amount = request.amount,
            full = full_refund,
            "refund issued"
        );
        metrics::counter!("refunds_total").increment(1);

        self.notify_rider_for_trip(
            updated.trip_id,
            NotificationKind::RefundIssued,
            format!("₹{:.2} refunded: {}", request.amount, request.reason),
        )
        .await;

        Ok(RefundPaymentResponse {
            refund_id: refund.id,
            status: new_status,
        })
    }

    /// Charge the gateway under its deadline and settle the row either way.
    async fn charge_and_settle(
        &self,
        trip: &TripEntity,
        pending: PaymentEntity,
    ) -> Result<PaymentEntity, EngineError> {
        let deadline = Duration::from_millis(self.config.gateway_timeout_ms);
        let charge = tokio::time::timeout(
            deadline,
            self.gateway
                .charge(pending.amount, &pending.payment_method_id),
        )
        .await;

        let settled = match charge {
            Ok(ChargeOutcome::Approved { psp_ref }) => {
                let updated = self.payments.mark_completed(pending.id, &psp_ref).await?;
                info!(
                    payment_id = %updated.id,
                    trip_id = %trip.id,
                    amount = updated.amount,
                    attempts = updated.attempts,
                    "payment completed"
                );
                metrics::counter!("payments_completed_total").increment(1);
                self.notify_rider_for_trip(
                    trip.id,
                    NotificationKind::PaymentSuccess,
                    format!("Payment of ₹{:.2} received. Thanks for riding!", updated.amount),
                )
                .await;
                updated
            }
            Ok(ChargeOutcome::Declined { reason }) => {
                let updated = self.payments.mark_failed(pending.id, &reason).await?;
                warn!(
                    payment_id = %updated.id,
                    trip_id = %trip.id,
                    reason = %reason,
                    attempts = updated.attempts,
                    "payment declined"
                );
                metrics::counter!("payments_failed_total").increment(1);
                self.notify_rider_for_trip(
                    trip.id,
                    NotificationKind::PaymentFailed,
                    format!("Payment failed: {}. Please update your payment method.", reason),
                )
                .await;
                updated
            }
            Err(_) => {
                let updated = self
                    .payments
                    .mark_failed(pending.id, "gateway timeout")
                    .await?;
                warn!(
                    payment_id = %updated.id,
                    trip_id = %trip.id,
                    deadline_ms = self.config.gateway_timeout_ms,
                    "gateway charge timed out"
                );
                metrics::counter!("payments_timeout_total").increment(1);
                self.notify_rider_for_trip(
                    trip.id,
                    NotificationKind::PaymentFailed,
                    "Payment timed out. Please retry.".to_string(),
                )
                .await;
                updated
            }
        };

        Ok(settled)
    }

    /// Best-effort rider notification resolved through trip → ride.
    async fn notify_rider_for_trip(&self, trip_id: Uuid, kind: NotificationKind, message: String) {
        match self.resolve_rider(trip_id).await {
            Ok(Some((ride_id, rider_id))) => {
                if let Err(e) = self
                    .notifications
                    .insert(NotificationInput {
                        recipient_id: rider_id,
                        recipient_role: RecipientRole::Rider,
                        ride_id: Some(ride_id),
                        kind,
                        message,
                    })
                    .await
                {
                    warn!(trip_id = %trip_id, error = %e, "failed to write payment notification");
                }
            }
            Ok(None) => {
                warn!(trip_id = %trip_id, "trip/ride missing for payment notification");
            }
            Err(e) => {
                warn!(trip_id = %trip_id, error = %e, "failed to resolve rider for notification");
            }
        }
    }

    async fn resolve_rider(&self, trip_id: Uuid) -> Result<Option<(Uuid, Uuid)>, sqlx::Error> {
        let Some(trip) = self.trips.find_by_id(trip_id).await? else {
            return Ok(None);
        };
        Ok(self
            .rides
            .find_by_id(trip.ride_id)
            .await?
            .map(|ride| (ride.id, ride.rider_id)))
    }
}
