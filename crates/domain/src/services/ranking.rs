//! Candidate ranking for the matching loop.
//!
//! Candidates come back from the geo index ordered by distance; this module
//! applies the tier filter and the rating preference before the engine walks
//! the list offering the ride.

use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::RideType;

/// Distance band inside which a higher rating beats a shorter approach.
const RATING_PREFERENCE_BAND_KM: f64 = 0.5;

/// A match candidate as produced by a geo query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub rating: f64,
    pub vehicle_type: RideType,
}

/// Orders candidates for offering.
///
/// Primary order is ascending distance, banded into 0.5 km buckets so the
/// comparison stays a total order; within a band the higher rating wins and
/// the final tiebreak is driver id ascending, keeping the order deterministic.
pub fn rank_candidates(
    mut candidates: Vec<RankedCandidate>,
    requested_tier: Option<RideType>,
) -> Vec<RankedCandidate> {
    if let Some(tier) = requested_tier {
        candidates.retain(|c| c.vehicle_type == tier);
    }

    candidates.sort_by(compare_candidates);
    candidates
}

fn distance_band(distance_km: f64) -> i64 {
    (distance_km / RATING_PREFERENCE_BAND_KM).floor() as i64
}

fn compare_candidates(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    distance_band(a.distance_km)
        .cmp(&distance_band(b.distance_km))
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| a.driver_id.cmp(&b.driver_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u128, distance_km: f64, rating: f64) -> RankedCandidate {
        RankedCandidate {
            driver_id: Uuid::from_u128(id),
            distance_km,
            rating,
            vehicle_type: RideType::Standard,
        }
    }

    #[test]
    fn test_distance_dominates_outside_band() {
        let ranked = rank_candidates(
            vec![candidate(2, 3.0, 5.0), candidate(1, 1.0, 3.5)],
            None,
        );
        assert_eq!(ranked[0].driver_id, Uuid::from_u128(1));
        assert_eq!(ranked[1].driver_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_rating_wins_inside_band() {
        // D1 at 0.0 km rating 4.9, D2 at 0.79 km rating 4.6: outside the band,
        // distance rules. Bring them inside the band and rating rules.
        let ranked = rank_candidates(
            vec![candidate(1, 0.10, 4.6), candidate(2, 0.35, 4.9)],
            None,
        );
        assert_eq!(ranked[0].driver_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_equal_rating_ties_break_by_driver_id() {
        let ranked = rank_candidates(
            vec![candidate(9, 0.2, 4.8), candidate(3, 0.3, 4.8)],
            None,
        );
        assert_eq!(ranked[0].driver_id, Uuid::from_u128(3));
        assert_eq!(ranked[1].driver_id, Uuid::from_u128(9));
    }

    #[test]
    fn test_tier_filter() {
        let mut premium = candidate(1, 0.1, 4.9);
        premium.vehicle_type = RideType::Premium;
        let standard = candidate(2, 0.5, 4.5);

        let ranked = rank_candidates(vec![premium, standard], Some(RideType::Standard));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].driver_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_no_tier_filter_keeps_all() {
        let mut premium = candidate(1, 0.1, 4.9);
        premium.vehicle_type = RideType::Premium;
        let standard = candidate(2, 0.5, 4.5);

        let ranked = rank_candidates(vec![premium, standard], None);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_candidates(Vec::new(), None).is_empty());
    }
}
