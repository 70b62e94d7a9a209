//! Driver matching.
//!
//! The matching loop runs detached from the request that created the ride;
//! its outcome is observable only through `ride:<id>` updates and `getRide`.
//! Claims are serialized by the per-ride matching lock and committed by the
//! guarded two-row transaction in the ride repository, which together give
//! the single-winner guarantee across loop candidates and concurrent
//! `acceptRide` callers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{ride_topic, BusEvent, UpdateBus};
use crate::cache::RideCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geo_index::GeoIndex;
use crate::lock::LockService;
use crate::presence::PresenceRegistry;
use domain::models::{NotificationKind, RecipientRole, RideEventType, RideStatus, RideType};
use domain::services::ranking::{rank_candidates, RankedCandidate};
use persistence::entities::RideEntity;
use persistence::repositories::{
    MatchAttempt, NotificationInput, NotificationRepository, RideEventRepository, RideRepository,
};

/// Why a claim did not assign the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRejection {
    /// The ride already left SEARCHING; no further candidates make sense.
    RideNotSearching,
    /// This driver was taken; the next candidate may still win.
    DriverNotAvailable,
}

/// Shared matching machinery, cloned into the detached loop task.
#[derive(Clone)]
pub struct Matcher {
    config: Arc<EngineConfig>,
    geo: Arc<GeoIndex>,
    bus: Arc<UpdateBus>,
    locks: Arc<LockService>,
    presence: Arc<PresenceRegistry>,
    cache: Arc<RideCache>,
    rides: RideRepository,
    notifications: NotificationRepository,
    events: RideEventRepository,
}

impl Matcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<EngineConfig>,
        geo: Arc<GeoIndex>,
        bus: Arc<UpdateBus>,
        locks: Arc<LockService>,
        presence: Arc<PresenceRegistry>,
        cache: Arc<RideCache>,
        rides: RideRepository,
        notifications: NotificationRepository,
        events: RideEventRepository,
    ) -> Self {
        Self {
            config,
            geo,
            bus,
            locks,
            presence,
            cache,
            rides,
            notifications,
            events,
        }
    }

    /// Detach the matching loop for a freshly created ride.
    pub fn spawn(&self, ride_id: Uuid) {
        let matcher = self.clone();
        tokio::spawn(async move {
            matcher.run(ride_id).await;
        });
    }

    /// The matching loop. Never raises; failures are logged and the rider
    /// learns the outcome through status updates.
    pub async fn run(&self, ride_id: Uuid) {
        for attempt in 1..=self.config.match_max_attempts {
            // Another actor (cancel, accept) may have moved the ride.
            match self.rides.current_status(ride_id).await {
                Ok(Some(RideStatus::Searching)) => {}
                Ok(_) => {
                    debug!(ride_id = %ride_id, "ride left SEARCHING, matching loop exits");
                    return;
                }
                Err(e) => {
                    warn!(ride_id = %ride_id, error = %e, "status check failed, continuing");
                }
            }

            if let Err(e) = self.rides.record_search_attempt(ride_id).await {
                warn!(ride_id = %ride_id, error = %e, "failed to record search attempt");
            }

            match self.attempt_once(ride_id).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    // Transient errors do not abort the loop.
                    warn!(ride_id = %ride_id, attempt, error = %e, "matching attempt errored");
                }
            }

            if attempt < self.config.match_max_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.match_backoff_ms)).await;
            }
        }

        self.give_up(ride_id).await;
    }

    /// One pass over the candidate list. Ok(true) means the ride matched or
    /// terminally left SEARCHING; Ok(false) means try again after backoff.
    async fn attempt_once(&self, ride_id: Uuid) -> Result<bool, EngineError> {
        let Some(ride) = self.rides.find_by_id(ride_id).await? else {
            warn!(ride_id = %ride_id, "ride vanished during matching");
            return Ok(true);
        };
        let requested_tier = ride.ride_type.parse::<RideType>().ok();

        let hits = self
            .geo
            .query(
                ride.pickup_latitude,
                ride.pickup_longitude,
                self.config.search_radius_km,
                self.config.search_limit,
            )
            .await;

        if hits.is_empty() {
            debug!(ride_id = %ride_id, "no drivers in range");
            return Ok(false);
        }

        let candidates = rank_candidates(
            hits.iter()
                .map(|hit| RankedCandidate {
                    driver_id: hit.driver_id,
                    distance_km: hit.distance_km,
                    rating: hit.meta.rating,
                    vehicle_type: hit.meta.vehicle_type,
                })
                .collect(),
            requested_tier,
        );

        for candidate in candidates {
            match self.claim(ride_id, candidate.driver_id).await {
                Ok(_) => {
                    info!(
                        ride_id = %ride_id,
                        driver_id = %candidate.driver_id,
                        distance_km = candidate.distance_km,
                        "driver matched"
                    );
                    metrics::counter!("rides_matched_total").increment(1);
                    return Ok(true);
                }
                Err(ClaimError::Rejected(ClaimRejection::RideNotSearching)) => {
                    debug!(ride_id = %ride_id, "ride no longer SEARCHING, loop exits");
                    return Ok(true);
                }
                Err(ClaimError::Rejected(ClaimRejection::DriverNotAvailable)) => {
                    debug!(
                        ride_id = %ride_id,
                        driver_id = %candidate.driver_id,
                        "candidate unavailable, trying next"
                    );
                }
                Err(ClaimError::Engine(e)) => {
                    warn!(
                        ride_id = %ride_id,
                        driver_id = %candidate.driver_id,
                        error = %e,
                        "claim errored, trying next candidate"
                    );
                }
            }
        }

        Ok(false)
    }

    /// Atomically claim a driver for a ride and apply the match side effects.
    ///
    /// Also the backing for `acceptRide`: concurrent callers serialize on the
    /// matching lock, and the transaction re-checks both statuses, so exactly
    /// one claim wins.
    pub async fn claim(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
    ) -> Result<RideEntity, ClaimError> {
        let lock_name = format!("lock:ride:{}:matching", ride_id);
        let ttl = Duration::from_millis(self.config.match_lock_ttl_ms);

        let attempt = self
            .locks
            .with_lock(&lock_name, ttl, || async {
                Ok(self.rides.try_match(ride_id, driver_id).await?)
            })
            .await
            .map_err(ClaimError::Engine)?;

        let ride = match attempt {
            MatchAttempt::Matched(ride) => ride,
            MatchAttempt::RideNotSearching => {
                return Err(ClaimError::Rejected(ClaimRejection::RideNotSearching));
            }
            MatchAttempt::DriverNotAvailable => {
                return Err(ClaimError::Rejected(ClaimRejection::DriverNotAvailable));
            }
        };

        // Committed: the driver is off the market.
        self.geo.remove(driver_id).await;
        self.presence.set_driver_on_ride(driver_id, ride_id).await;
        self.cache.invalidate(ride_id);

        if let Err(e) = self
            .events
            .append(
                ride_id,
                RideEventType::DriverMatched,
                serde_json::json!({
                    "driverId": driver_id,
                    "matchedAt": Utc::now(),
                }),
            )
            .await
        {
            warn!(ride_id = %ride_id, error = %e, "failed to append driver_matched event");
        }

        self.bus
            .publish(
                &ride_topic(ride_id),
                BusEvent::RideStatus {
                    ride_id,
                    status: RideStatus::Matched,
                    driver_id: Some(driver_id),
                },
            )
            .await;

        Ok(ride)
    }

    /// All attempts exhausted: the ride fails and the rider hears about it.
    async fn give_up(&self, ride_id: Uuid) {
        let failed = match self.rides.mark_failed(ride_id).await {
            Ok(Some(ride)) => ride,
            Ok(None) => {
                debug!(ride_id = %ride_id, "ride left SEARCHING before failing");
                return;
            }
            Err(e) => {
                warn!(ride_id = %ride_id, error = %e, "failed to mark ride FAILED");
                return;
            }
        };

        metrics::counter!("rides_match_failed_total").increment(1);
        info!(ride_id = %ride_id, attempts = self.config.match_max_attempts, "no driver found");

        self.cache.invalidate(ride_id);
        self.presence.clear_rider_active(failed.rider_id).await;

        if let Err(e) = self
            .events
            .append(
                ride_id,
                RideEventType::MatchingFailed,
                serde_json::json!({ "attempts": self.config.match_max_attempts }),
            )
            .await
        {
            warn!(ride_id = %ride_id, error = %e, "failed to append matching_failed event");
        }

        if let Err(e) = self
            .notifications
            .insert(NotificationInput {
                recipient_id: failed.rider_id,
                recipient_role: RecipientRole::Rider,
                ride_id: Some(ride_id),
                kind: NotificationKind::RideFailed,
                message: "No drivers available right now. Please try again.".to_string(),
            })
            .await
        {
            warn!(ride_id = %ride_id, error = %e, "failed to write ride_failed notification");
        }

        self.bus
            .publish(
                &ride_topic(ride_id),
                BusEvent::RideStatus {
                    ride_id,
                    status: RideStatus::Failed,
                    driver_id: None,
                },
            )
            .await;
    }
}

/// Error surface of `claim`.
#[derive(Debug)]
pub enum ClaimError {
    /// Structured rejection; the caller decides whether to move on.
    Rejected(ClaimRejection),
    /// Lock contention, database trouble, and the like.
    Engine(EngineError),
}

impl ClaimError {
    /// Collapse into the engine taxonomy for external callers.
    pub fn into_engine_error(self) -> EngineError {
        match self {
            ClaimError::Rejected(ClaimRejection::RideNotSearching) => {
                EngineError::Conflict("Ride is no longer searching for a driver".into())
            }
            ClaimError::Rejected(ClaimRejection::DriverNotAvailable) => {
                EngineError::Conflict("Driver is not available".into())
            }
            ClaimError::Engine(e) => e,
        }
    }
}
