//! Pure business services.

pub mod fare;
pub mod payment_gateway;
pub mod ranking;

pub use fare::{FareBreakdown, FareInputs};
pub use payment_gateway::{ChargeOutcome, MockPaymentGateway, PaymentGateway};
pub use ranking::{rank_candidates, RankedCandidate};
