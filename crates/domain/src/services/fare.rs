//! Fare calculation.
//!
//! The fare function is pure: frozen pricing inputs go in, a rounded
//! breakdown comes out. Monetary outputs are rounded to two decimal places
//! with banker's half-to-even; distances and durations are never rounded.

use serde::{Deserialize, Serialize};

/// Platform's cut of the final fare.
pub const PLATFORM_FEE_RATE: f64 = 0.20;

/// Tax rate applied on receipts.
pub const RECEIPT_TAX_RATE: f64 = 0.18;

/// Cancellation fee fraction of the estimated fare, charged as metadata only.
pub const CANCELLATION_FEE_RATE: f64 = 0.10;

/// Assumed city travel pace for fare estimates, in seconds per kilometre.
const ESTIMATE_SECS_PER_KM: f64 = 120.0;

/// Inputs to the fare formula.
#[derive(Debug, Clone, Copy)]
pub struct FareInputs {
    pub distance_km: f64,
    pub duration_secs: f64,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub surge_multiplier: f64,
    pub discount: f64,
}

/// A fully derived fare.
///
/// Invariant: `platform_fee + driver_earnings == final_fare` to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub distance_fare: f64,
    pub time_fare: f64,
    pub subtotal: f64,
    pub surge_amount: f64,
    pub total_fare: f64,
    pub final_fare: f64,
    pub platform_fee: f64,
    pub driver_earnings: f64,
}

/// Rounds a monetary amount to two decimals, ties to even.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round_ties_even() / 100.0
}

/// Computes the fare breakdown for a trip.
pub fn calculate_fare(inputs: FareInputs) -> FareBreakdown {
    let distance_fare = inputs.distance_km * inputs.per_km_rate;
    let time_fare = (inputs.duration_secs / 60.0) * inputs.per_min_rate;
    let subtotal = inputs.base_fare + distance_fare + time_fare;
    let surge_amount = subtotal * (inputs.surge_multiplier - 1.0);
    let total_fare = subtotal + surge_amount;
    let final_fare = round_money((total_fare - inputs.discount).max(0.0));
    let platform_fee = round_money(final_fare * PLATFORM_FEE_RATE);
    // Derived as a difference so the conservation invariant holds exactly.
    let driver_earnings = round_money(final_fare - platform_fee);

    FareBreakdown {
        distance_fare: round_money(distance_fare),
        time_fare: round_money(time_fare),
        subtotal: round_money(subtotal),
        surge_amount: round_money(surge_amount),
        total_fare: round_money(total_fare),
        final_fare,
        platform_fee,
        driver_earnings,
    }
}

/// Tax due on a receipt for the given final fare.
pub fn receipt_tax(final_fare: f64) -> f64 {
    round_money(final_fare * RECEIPT_TAX_RATE)
}

/// Cancellation fee in whole rupees for a ride cancelled at or after MATCHED.
pub fn cancellation_fee(estimated_fare: f64) -> i64 {
    (estimated_fare * CANCELLATION_FEE_RATE) as i64
}

/// Up-front estimate for ride creation from the straight-line distance.
///
/// Returns (fare, duration_secs). The straight-line approximation is
/// deliberate; there is no road graph in the core.
pub fn estimate_fare(
    distance_km: f64,
    base_fare: f64,
    per_km_rate: f64,
    per_min_rate: f64,
    surge_multiplier: f64,
) -> (f64, i64) {
    let duration_secs = distance_km * ESTIMATE_SECS_PER_KM;
    let breakdown = calculate_fare(FareInputs {
        distance_km,
        duration_secs,
        base_fare,
        per_km_rate,
        per_min_rate,
        surge_multiplier,
        discount: 0.0,
    });
    (breakdown.final_fare, duration_secs as i64)
}
