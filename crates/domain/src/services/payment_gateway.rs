//! Payment gateway facade.
//!
//! The engine never talks to a PSP directly; it sees this narrow charge
//! contract. The embedding process supplies a real implementation; the mock
//! is used in development and tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Result of a charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The PSP accepted the charge and returned its transaction reference.
    Approved { psp_ref: String },
    /// The PSP rejected the charge (insufficient funds, expired card, ...).
    Declined { reason: String },
}

impl ChargeOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ChargeOutcome::Approved { .. })
    }
}

/// Idempotent charge facade over the external payment service provider.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the given amount against a stored payment method.
    ///
    /// Implementations must be idempotent per (amount, method, reference)
    /// so the engine can safely retry after a timeout.
    async fn charge(&self, amount: f64, payment_method_id: &str) -> ChargeOutcome;
}

/// Mock gateway for development and testing.
///
/// Outcomes can be scripted in order; once the script drains, every charge
/// is approved with a fresh reference.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    scripted: Mutex<VecDeque<ChargeOutcome>>,
}

impl MockPaymentGateway {
    /// Create a gateway that approves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway that plays back the given outcomes in order.
    pub fn with_script(outcomes: Vec<ChargeOutcome>) -> Self {
        Self {
            scripted: Mutex::new(outcomes.into()),
        }
    }

    /// Queue one more scripted outcome.
    pub fn push_outcome(&self, outcome: ChargeOutcome) {
        self.scripted
            .lock()
            .expect("gateway script lock poisoned")
            .push_back(outcome);
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, amount: f64, payment_method_id: &str) -> ChargeOutcome {
        let scripted = self
            .scripted
            .lock()
            .expect("gateway script lock poisoned")
            .pop_front();

        let outcome = scripted.unwrap_or_else(|| ChargeOutcome::Approved {
            psp_ref: format!("psp_{}", Uuid::new_v4().simple()),
        });

        tracing::debug!(
            amount,
            payment_method_id,
            approved = outcome.is_approved(),
            "mock gateway charge"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_approves_by_default() {
        let gateway = MockPaymentGateway::new();
        let outcome = gateway.charge(233.28, "pm_card_1").await;
        assert!(outcome.is_approved());
    }

    #[tokio::test]
    async fn test_mock_plays_script_in_order() {
        let gateway = MockPaymentGateway::with_script(vec![
            ChargeOutcome::Declined {
                reason: "insufficient_funds".to_string(),
            },
            ChargeOutcome::Approved {
                psp_ref: "psp_fixed".to_string(),
            },
        ]);

        let first = gateway.charge(100.0, "pm").await;
        assert_eq!(
            first,
            ChargeOutcome::Declined {
                reason: "insufficient_funds".to_string()
            }
        );

        let second = gateway.charge(100.0, "pm").await;
        assert_eq!(
            second,
            ChargeOutcome::Approved {
                psp_ref: "psp_fixed".to_string()
            }
        );

        // Script drained: back to approvals.
        assert!(gateway.charge(100.0, "pm").await.is_approved());
    }
}
