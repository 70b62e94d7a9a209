//! The ride engine: orchestration of the full ride lifecycle.
//!
//! Every operation follows the same shape: validate the request, run the
//! guarded repository transition, then apply side effects (audit event,
//! cache invalidation, notifications, bus publish). Side effects are
//! best-effort; the guarded transition is the source of truth.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::bus::{ride_topic, BusEvent, UpdateBus};
use crate::cache::RideCache;
use crate::config::EngineConfig;
use crate::error::{is_unique_violation, EngineError};
use crate::geo_index::{DriverMeta, GeoIndex};
use crate::idempotency::IdempotencyStore;
use crate::jobs::{CleanupLocationsJob, HousekeepingSweepJob, JobScheduler, PoolMetricsJob};
use crate::location::LocationPipeline;
use crate::lock::LockService;
use crate::matching::Matcher;
use crate::payments::PaymentProcessor;
use crate::presence::PresenceRegistry;
use crate::surge::SurgeResolver;
use domain::models::{
    AcceptRideResponse, CancelRideRequest, CreateRideRequest, Driver, DriverStatus, EndTripRequest,
    NotificationKind, Payment, ProcessPaymentRequest, RecipientRole, RefundPaymentRequest,
    RefundPaymentResponse, Ride, RideEventType, RideStatus, StartTripRequest, Trip, TripStatus,
    UpdateDriverAvailabilityRequest, UpdateDriverLocationRequest,
};
use domain::services::fare::{
    calculate_fare, cancellation_fee, estimate_fare, receipt_tax, FareInputs,
};
use domain::services::PaymentGateway;
use persistence::repositories::{
    DriverLocationRepository, DriverRepository, LocationHistoryQuery, NotificationInput,
    NotificationRepository, PaymentRepository, PricingConfigRepository, PricingSnapshot,
    RideEventRepository, RideInput, RideRepository, RiderRepository, SettlementInput,
    TripRepository,
};
use shared::geo::{haversine_km, Coordinates};
use shared::pagination::{decode_cursor, encode_cursor, PageParams, Paged};

/// What a driver gets back from `markArrived`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalInfo {
    pub trip_id: Uuid,
    pub ride_id: Uuid,
    pub otp: String,
}

/// The transport-agnostic core of the ride platform.
pub struct RideEngine {
    config: Arc<EngineConfig>,
    pool: PgPool,
    geo: Arc<GeoIndex>,
    bus: Arc<UpdateBus>,
    locks: Arc<LockService>,
    idempotency: Arc<IdempotencyStore>,
    presence: Arc<PresenceRegistry>,
    cache: Arc<RideCache>,
    pipeline: Arc<LocationPipeline>,
    matcher: Matcher,
    payments: PaymentProcessor,
    surge: SurgeResolver,
    rides: RideRepository,
    drivers: DriverRepository,
    riders: RiderRepository,
    trips: TripRepository,
    notifications: NotificationRepository,
    events: RideEventRepository,
    pricing: PricingConfigRepository,
    locations: DriverLocationRepository,
    location_shutdown: watch::Sender<bool>,
}

impl RideEngine {
    /// Wire up the engine. Background workers are not started here; call
    /// [`spawn_location_worker`](Self::spawn_location_worker) and
    /// [`build_scheduler`](Self::build_scheduler) once a runtime is running.
    pub fn new(
        pool: PgPool,
        config: EngineConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let geo = Arc::new(GeoIndex::new());
        let bus = Arc::new(UpdateBus::new());
        let locks = Arc::new(LockService::new());
        let idempotency = Arc::new(IdempotencyStore::new());
        let presence = Arc::new(PresenceRegistry::new());
        let cache = Arc::new(RideCache::new(config.ride_cache_capacity));

        let rides = RideRepository::new(pool.clone());
        let drivers = DriverRepository::new(pool.clone());
        let riders = RiderRepository::new(pool.clone());
        let trips = TripRepository::new(pool.clone());
        let notifications = NotificationRepository::new(pool.clone());
        let events = RideEventRepository::new(pool.clone());
        let pricing = PricingConfigRepository::new(pool.clone());
        let locations = DriverLocationRepository::new(pool.clone());

        let pipeline = Arc::new(LocationPipeline::new(
            Arc::clone(&config),
            Arc::clone(&geo),
            Arc::clone(&bus),
            Arc::clone(&presence),
            locations.clone(),
        ));

        let matcher = Matcher::new(
            Arc::clone(&config),
            Arc::clone(&geo),
            Arc::clone(&bus),
            Arc::clone(&locks),
            Arc::clone(&presence),
            Arc::clone(&cache),
            rides.clone(),
            notifications.clone(),
            events.clone(),
        );

        let payments = PaymentProcessor::new(
            Arc::clone(&config),
            gateway,
            Arc::clone(&idempotency),
            PaymentRepository::new(pool.clone()),
            trips.clone(),
            rides.clone(),
            notifications.clone(),
        );

        let surge = SurgeResolver::new(pool.clone());
        let (location_shutdown, _) = watch::channel(false);

        Arc::new(Self {
            config,
            pool,
            geo,
            bus,
            locks,
            idempotency,
            presence,
            cache,
            pipeline,
            matcher,
            payments,
            surge,
            rides,
            drivers,
            riders,
            trips,
            notifications,
            events,
            pricing,
            locations,
            location_shutdown,
        })
    }

    /// Start the location pipeline drain worker.
    pub fn spawn_location_worker(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let shutdown = self.location_shutdown.subscribe();
        tokio::spawn(pipeline.run_worker(shutdown))
    }

    /// Build the housekeeping scheduler; the caller starts and owns it.
    pub fn build_scheduler(&self) -> JobScheduler {
        let mut scheduler = JobScheduler::new();
        scheduler.register(CleanupLocationsJob::new(
            self.pool.clone(),
            self.config.location_retention_days,
        ));
        scheduler.register(HousekeepingSweepJob::new(
            Arc::clone(&self.geo),
            Arc::clone(&self.locks),
            Arc::clone(&self.idempotency),
            Arc::clone(&self.bus),
            self.config.geo_staleness_secs,
        ));
        scheduler.register(PoolMetricsJob::new(self.pool.clone()));
        scheduler
    }

    /// Stop the pipeline worker after a final flush.
    pub async fn shutdown(&self) {
        let _ = self.location_shutdown.send(true);
        self.pipeline.drain().await;
    }

    pub fn bus(&self) -> &Arc<UpdateBus> {
        &self.bus
    }

    pub fn geo_index(&self) -> &Arc<GeoIndex> {
        &self.geo
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    pub fn pipeline(&self) -> &Arc<LocationPipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Rides
    // ------------------------------------------------------------------

    /// Create a ride and kick off matching.
    ///
    /// Replays: a previously used idempotency key returns the stored ride
    /// unchanged, whether detected up front or via the unique index.
    pub async fn create_ride(&self, request: CreateRideRequest) -> Result<Ride, EngineError> {
        request.validate()?;

        self.riders
            .find_by_id(request.rider_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Rider not found".into()))?;

        if let Some(existing) = self
            .rides
            .find_by_idempotency_key(&request.idempotency_key)
            .await?
        {
            info!(ride_id = %existing.id, "ride creation replayed");
            return Ok(existing.into());
        }

        let pickup = Coordinates::new(request.pickup.lat, request.pickup.lng);
        let dropoff = Coordinates::new(request.dropoff.lat, request.dropoff.lng);
        let distance_km = haversine_km(pickup, dropoff);

        let surge_multiplier = self
            .surge
            .multiplier_at(request.pickup.lat, request.pickup.lng)
            .await?;

        let (base_fare, per_km_rate, per_min_rate) = self.pricing_for(request.ride_type).await?;
        let (estimated_fare, estimated_duration_secs) = estimate_fare(
            distance_km,
            base_fare,
            per_km_rate,
            per_min_rate,
            surge_multiplier,
        );

        let input = RideInput {
            rider_id: request.rider_id,
            pickup_latitude: request.pickup.lat,
            pickup_longitude: request.pickup.lng,
            pickup_address: request.pickup.address.clone(),
            dropoff_latitude: request.dropoff.lat,
            dropoff_longitude: request.dropoff.lng,
            dropoff_address: request.dropoff.address.clone(),
            ride_type: request.ride_type,
            estimated_fare,
            estimated_distance_km: distance_km,
            estimated_duration_secs,
            surge_multiplier,
            idempotency_key: Some(request.idempotency_key.clone()),
            payment_method_id: request.payment_method_id.clone(),
            scheduled_at: request.scheduled_at,
        };

        let ride = match self.rides.create(input).await {
            Ok(ride) => ride,
            Err(e) if is_unique_violation(&e) => {
                // Raced another create with the same key; replay the winner.
                return self
                    .rides
                    .find_by_idempotency_key(&request.idempotency_key)
                    .await?
                    .map(Into::into)
                    .ok_or_else(|| {
                        EngineError::Internal("idempotent ride vanished after conflict".into())
                    });
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("rides_created_total").increment(1);
        info!(
            ride_id = %ride.id,
            rider_id = %ride.rider_id,
            surge = surge_multiplier,
            estimated_fare,
            "ride created"
        );

        self.presence
            .set_rider_active(ride.rider_id, ride.id)
            .await;
        self.append_event(
            ride.id,
            RideEventType::RideCreated,
            serde_json::json!({
                "riderId": ride.rider_id,
                "rideType": ride.ride_type,
                "estimatedFare": estimated_fare,
            }),
        )
        .await;
        self.publish_status(ride.id, RideStatus::Searching, None).await;

        // Future-scheduled rides keep their timestamp but are not dispatched.
        let dispatch_now = request
            .scheduled_at
            .map_or(true, |scheduled| scheduled <= Utc::now());
        if dispatch_now {
            self.matcher.spawn(ride.id);
        }

        Ok(ride.into())
    }

    /// Fetch a ride, served from the read cache when possible.
    pub async fn get_ride(&self, ride_id: Uuid) -> Result<Ride, EngineError> {
        if let Some(cached) = self.cache.get(ride_id) {
            return Ok(cached);
        }

        let ride: Ride = self
            .rides
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Ride not found".into()))?
            .into();

        self.cache.put(ride.clone());
        Ok(ride)
    }

    /// Cancel a ride from any non-terminal state except IN_PROGRESS.
    ///
    /// Serialized against matching through the per-ride lock, so a cancel
    /// racing a match observes a consistent before/after order.
    pub async fn cancel_ride(&self, request: CancelRideRequest) -> Result<Ride, EngineError> {
        request.validate()?;
        let ride_id = request.ride_id;

        let lock_name = format!("lock:ride:{}:matching", ride_id);
        let ttl = Duration::from_millis(self.config.match_lock_ttl_ms);

        // Waits behind an in-flight claim so cancel and match serialize; the
        // later action observes the earlier state.
        let cancelled = self
            .locks
            .with_lock_wait(&lock_name, ttl, ttl, || async {
                let ride = self
                    .rides
                    .find_by_id(ride_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("Ride not found".into()))?;

                let status = ride
                    .status
                    .parse::<RideStatus>()
                    .map_err(EngineError::Internal)?;
                if !status.is_cancellable() {
                    return Err(EngineError::Conflict(format!(
                        "Ride in status {} cannot be cancelled",
                        status
                    )));
                }

                // Fee applies once a driver was committed to the ride.
                let fee = if status.has_driver() {
                    Some(cancellation_fee(ride.estimated_fare))
                } else {
                    None
                };

                self.rides
                    .cancel(ride_id, request.cancelled_by, request.reason.as_deref(), fee)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Conflict("Ride was concurrently moved to a terminal state".into())
                    })
            })
            .await?;

        metrics::counter!("rides_cancelled_total").increment(1);
        info!(
            ride_id = %ride_id,
            by = request.cancelled_by.as_str(),
            fee = ?cancelled.cancellation_fee,
            "ride cancelled"
        );

        if let Some(driver_id) = cancelled.driver_id {
            self.presence.release_driver(driver_id).await;
            self.reindex_driver(driver_id).await;
            self.notify(
                driver_id,
                RecipientRole::Driver,
                Some(ride_id),
                NotificationKind::RideCancelled,
                "The ride was cancelled.".to_string(),
            )
            .await;
        }
        self.presence.clear_rider_active(cancelled.rider_id).await;
        self.cache.invalidate(ride_id);
        self.append_event(
            ride_id,
            RideEventType::RideCancelled,
            serde_json::json!({
                "cancelledBy": request.cancelled_by,
                "reason": request.reason,
                "cancellationFee": cancelled.cancellation_fee,
            }),
        )
        .await;
        self.notify(
            cancelled.rider_id,
            RecipientRole::Rider,
            Some(ride_id),
            NotificationKind::RideCancelled,
            match cancelled.cancellation_fee {
                Some(fee) if fee > 0 => {
                    format!("Ride cancelled. A cancellation fee of ₹{} applies.", fee)
                }
                _ => "Ride cancelled.".to_string(),
            },
        )
        .await;
        self.publish_status(ride_id, RideStatus::Cancelled, cancelled.driver_id)
            .await;

        Ok(cancelled.into())
    }

    /// A rider's ride history, newest first.
    pub async fn list_rider_history(
        &self,
        rider_id: Uuid,
        params: PageParams,
    ) -> Result<Paged<Ride>, EngineError> {
        self.riders
            .find_by_id(rider_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Rider not found".into()))?;

        let params = params.clamped();
        let (rows, total) = self
            .rides
            .list_for_rider(rider_id, params.limit as i64, params.offset())
            .await?;

        Ok(Paged::new(
            rows.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }

    // ------------------------------------------------------------------
    // Drivers
    // ------------------------------------------------------------------

    /// Hot-path position ingest; delegates to the location pipeline.
    pub async fn update_driver_location(
        &self,
        request: UpdateDriverLocationRequest,
    ) -> Result<(), EngineError> {
        self.pipeline.record_ping(request).await
    }

    /// A driver's persisted position history, newest first.
    ///
    /// `cursor` continues a previous page; the returned cursor is None on the
    /// last page.
    pub async fn get_driver_location_history(
        &self,
        driver_id: Uuid,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<(Vec<domain::models::DriverPosition>, Option<String>), EngineError> {
        self.drivers
            .find_by_id(driver_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Driver not found".into()))?;

        let (cursor_timestamp, cursor_id) = match cursor {
            Some(raw) => {
                let (ts, id) = decode_cursor(raw)
                    .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
                (Some(ts), Some(id))
            }
            None => (None, None),
        };

        let (rows, has_more) = self
            .locations
            .get_history(LocationHistoryQuery {
                driver_id,
                cursor_timestamp,
                cursor_id,
                from_timestamp: None,
                to_timestamp: None,
                limit: limit.clamp(1, shared::pagination::MAX_PAGE_LIMIT) as i32,
            })
            .await?;

        let next_cursor = if has_more {
            rows.last().map(|row| encode_cursor(row.recorded_at, row.id))
        } else {
            None
        };

        Ok((rows.into_iter().map(Into::into).collect(), next_cursor))
    }

    /// Driver goes online, on break, or offline.
    ///
    /// ON_RIDE is engine-managed: drivers cannot set it, and a driver
    /// currently on a ride cannot change status until the ride resolves.
    pub async fn update_driver_availability(
        &self,
        request: UpdateDriverAvailabilityRequest,
    ) -> Result<Driver, EngineError> {
        if request.status == DriverStatus::OnRide {
            return Err(EngineError::Validation(
                "ON_RIDE is set by the engine, not by drivers".into(),
            ));
        }

        let driver = self
            .drivers
            .find_by_id(request.driver_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Driver not found".into()))?;

        let current = driver
            .status
            .parse::<DriverStatus>()
            .map_err(EngineError::Internal)?;
        if current == DriverStatus::OnRide {
            return Err(EngineError::Conflict(
                "Driver is on an active ride".into(),
            ));
        }

        let updated: Driver = self
            .drivers
            .set_status(request.driver_id, request.status)
            .await?
            .ok_or_else(|| EngineError::NotFound("Driver not found".into()))?
            .into();

        let meta = DriverMeta {
            rating: updated.rating,
            vehicle_type: updated.vehicle_type,
        };
        self.presence
            .set_driver_status(updated.id, request.status, meta)
            .await;

        // AVAILABLE drivers with a usable position enter the geo index;
        // everyone else leaves it.
        let indexed = request.status == DriverStatus::Available
            && self.position_is_fresh(&updated)
            && updated.position().is_some();
        if indexed {
            if let (Some((lat, lng)), Some(at)) =
                (updated.position(), updated.last_location_update)
            {
                self.geo
                    .add(updated.id, lat, lng, at.timestamp_millis(), meta)
                    .await;
            }
        } else {
            self.geo.remove(updated.id).await;
        }

        info!(
            driver_id = %updated.id,
            status = %request.status,
            indexed,
            "driver availability updated"
        );
        Ok(updated)
    }

    /// Driver explicitly accepts a ride; single-winner with the matching
    /// loop and concurrent accepts.
    pub async fn accept_ride(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
    ) -> Result<AcceptRideResponse, EngineError> {
        self.rides
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Ride not found".into()))?;
        self.drivers
            .find_by_id(driver_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Driver not found".into()))?;

        self.matcher
            .claim(ride_id, driver_id)
            .await
            .map_err(|e| e.into_engine_error())?;

        Ok(AcceptRideResponse {
            ride_id,
            message: "Ride accepted".to_string(),
        })
    }

    /// Driver is en route to pickup.
    pub async fn mark_arriving(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride, EngineError> {
        let updated = match self.rides.mark_driver_arriving(ride_id, driver_id).await? {
            Some(ride) => ride,
            None => {
                return Err(match self.rides.find_by_id(ride_id).await? {
                    None => EngineError::NotFound("Ride not found".into()),
                    Some(_) => EngineError::Conflict(
                        "Ride is not in MATCHED state for this driver".into(),
                    ),
                });
            }
        };

        self.cache.invalidate(ride_id);
        self.append_event(
            ride_id,
            RideEventType::DriverEnRoute,
            serde_json::json!({ "driverId": driver_id }),
        )
        .await;
        self.notify(
            updated.rider_id,
            RecipientRole::Rider,
            Some(ride_id),
            NotificationKind::DriverArriving,
            "Your driver is on the way.".to_string(),
        )
        .await;
        self.publish_status(ride_id, RideStatus::DriverArriving, Some(driver_id))
            .await;

        Ok(updated.into())
    }

    /// Driver is at pickup: generate the start OTP and open the trip.
    pub async fn mark_arrived(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
    ) -> Result<ArrivalInfo, EngineError> {
        let ride = self
            .rides
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Ride not found".into()))?;

        let ride_type = ride
            .ride_type
            .parse()
            .map_err(EngineError::Internal)?;
        let (base_fare, per_km_rate, per_min_rate) = self.pricing_for(ride_type).await?;
        let otp = shared::crypto::generate_otp();

        let trip = self
            .trips
            .create_pending_at_pickup(
                ride_id,
                driver_id,
                &otp,
                PricingSnapshot {
                    base_fare,
                    per_km_rate,
                    per_min_rate,
                    surge_multiplier: ride.surge_multiplier,
                    discount: 0.0,
                },
            )
            .await?
            .ok_or_else(|| {
                EngineError::Conflict("Ride is not in DRIVER_ARRIVING state for this driver".into())
            })?;

        self.cache.invalidate(ride_id);
        self.append_event(
            ride_id,
            RideEventType::DriverArrived,
            serde_json::json!({ "driverId": driver_id, "tripId": trip.id }),
        )
        .await;
        self.notify(
            ride.rider_id,
            RecipientRole::Rider,
            Some(ride_id),
            NotificationKind::ArrivalOtp,
            format!("Your driver has arrived. Share OTP {} to start the trip.", otp),
        )
        .await;
        self.publish_status(ride_id, RideStatus::Arrived, Some(driver_id))
            .await;

        Ok(ArrivalInfo {
            trip_id: trip.id,
            ride_id,
            otp,
        })
    }

    // ------------------------------------------------------------------
    // Trips
    // ------------------------------------------------------------------

    /// Start a trip after verifying the rider's OTP.
    ///
    /// A wrong OTP mutates nothing and comes back as a Validation error.
    pub async fn start_trip(&self, request: StartTripRequest) -> Result<Trip, EngineError> {
        request.validate()?;

        let trip = self
            .trips
            .find_by_id(request.trip_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Trip not found".into()))?;

        if trip.status.parse::<TripStatus>() != Ok(TripStatus::Pending) {
            return Err(EngineError::Conflict(
                "Trip is not awaiting start".into(),
            ));
        }
        if trip.start_otp != request.start_otp {
            metrics::counter!("trip_otp_mismatch_total").increment(1);
            return Err(EngineError::Validation("Incorrect start OTP".into()));
        }

        let started = self
            .trips
            .start(trip.id)
            .await?
            .ok_or_else(|| EngineError::Conflict("Trip could not be started".into()))?;

        info!(trip_id = %started.id, ride_id = %started.ride_id, "trip started");
        self.cache.invalidate(started.ride_id);
        self.append_event(
            started.ride_id,
            RideEventType::TripStarted,
            serde_json::json!({ "tripId": started.id }),
        )
        .await;
        self.publish_status(
            started.ride_id,
            RideStatus::InProgress,
            Some(started.driver_id),
        )
        .await;

        Ok(started.into())
    }

    /// End a trip: compute the fare and settle everything atomically.
    pub async fn end_trip(&self, request: EndTripRequest) -> Result<Trip, EngineError> {
        request.validate()?;

        let trip = self
            .trips
            .find_by_id(request.trip_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Trip not found".into()))?;

        if trip.status.parse::<TripStatus>() != Ok(TripStatus::Started) {
            return Err(EngineError::Conflict("Trip is not in progress".into()));
        }
        let start_time = trip
            .start_time
            .ok_or_else(|| EngineError::Internal("Started trip has no start time".into()))?;

        let ride = self
            .rides
            .find_by_id(trip.ride_id)
            .await?
            .ok_or_else(|| EngineError::Internal("Trip references a missing ride".into()))?;

        let end_time = Utc::now();
        let duration_secs =
            ((end_time - start_time).num_milliseconds().max(0) as f64) / 1000.0;

        let fare = calculate_fare(FareInputs {
            distance_km: request.actual_distance_km,
            duration_secs,
            base_fare: trip.base_fare,
            per_km_rate: trip.per_km_rate,
            per_min_rate: trip.per_min_rate,
            surge_multiplier: trip.surge_multiplier,
            discount: trip.discount,
        });

        let route_path = request
            .route_path
            .as_ref()
            .map(|path| serde_json::json!(path));

        let settled = self
            .trips
            .complete_settlement(SettlementInput {
                trip_id: trip.id,
                ride_id: trip.ride_id,
                driver_id: trip.driver_id,
                rider_id: ride.rider_id,
                actual_distance_km: request.actual_distance_km,
                route_path,
                end_time,
                distance_fare: fare.distance_fare,
                time_fare: fare.time_fare,
                surge_amount: fare.surge_amount,
                final_fare: fare.final_fare,
                platform_fee: fare.platform_fee,
                driver_earnings: fare.driver_earnings,
                receipt_tax: receipt_tax(fare.final_fare),
            })
            .await?
            .ok_or_else(|| EngineError::Conflict("Trip was concurrently settled".into()))?;

        metrics::counter!("trips_completed_total").increment(1);
        metrics::histogram!("trip_final_fare").record(fare.final_fare);
        info!(
            trip_id = %settled.id,
            ride_id = %settled.ride_id,
            final_fare = fare.final_fare,
            driver_earnings = fare.driver_earnings,
            "trip completed"
        );

        // Driver is back on the market at the dropoff point.
        self.presence.release_driver(trip.driver_id).await;
        if let Ok(Some(driver)) = self.drivers.find_by_id(trip.driver_id).await {
            let meta = DriverMeta {
                rating: driver.rating,
                vehicle_type: driver
                    .vehicle_type
                    .parse()
                    .unwrap_or(domain::models::RideType::Standard),
            };
            self.presence
                .set_driver_status(trip.driver_id, DriverStatus::Available, meta)
                .await;
            self.geo
                .add(
                    trip.driver_id,
                    request.end_location.lat,
                    request.end_location.lng,
                    end_time.timestamp_millis(),
                    meta,
                )
                .await;
        }
        self.presence.clear_rider_active(ride.rider_id).await;
        self.cache.invalidate(trip.ride_id);
        self.append_event(
            trip.ride_id,
            RideEventType::TripCompleted,
            serde_json::json!({
                "tripId": settled.id,
                "finalFare": fare.final_fare,
                "platformFee": fare.platform_fee,
                "driverEarnings": fare.driver_earnings,
                "distanceKm": request.actual_distance_km,
            }),
        )
        .await;
        self.notify(
            ride.rider_id,
            RecipientRole::Rider,
            Some(trip.ride_id),
            NotificationKind::RideCompleted,
            format!("Trip completed. Fare: ₹{:.2}.", fare.final_fare),
        )
        .await;
        self.notify(
            trip.driver_id,
            RecipientRole::Driver,
            Some(trip.ride_id),
            NotificationKind::RideCompleted,
            format!("Trip completed. You earned ₹{:.2}.", fare.driver_earnings),
        )
        .await;
        self.publish_status(trip.ride_id, RideStatus::Completed, Some(trip.driver_id))
            .await;

        Ok(settled.into())
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Idempotent fare settlement for a completed trip.
    pub async fn process_payment(
        &self,
        request: ProcessPaymentRequest,
    ) -> Result<Payment, EngineError> {
        self.payments.process(request).await
    }

    /// Retry a failed payment, bounded by the attempts ceiling.
    pub async fn retry_payment(&self, payment_id: Uuid) -> Result<Payment, EngineError> {
        self.payments.retry(payment_id).await
    }

    /// Refund part or all of a completed payment.
    pub async fn refund_payment(
        &self,
        request: RefundPaymentRequest,
    ) -> Result<RefundPaymentResponse, EngineError> {
        self.payments.refund(request).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Active pricing row for the configured region, or configured defaults.
    async fn pricing_for(
        &self,
        ride_type: domain::models::RideType,
    ) -> Result<(f64, f64, f64), EngineError> {
        let row = self
            .pricing
            .find_active(&self.config.region, ride_type)
            .await?;
        Ok(match row {
            Some(row) => (row.base_fare, row.per_km_rate, row.per_min_rate),
            None => (
                self.config.default_base_fare,
                self.config.default_per_km_rate,
                self.config.default_per_min_rate,
            ),
        })
    }

    fn position_is_fresh(&self, driver: &Driver) -> bool {
        match driver.last_location_update {
            Some(at) => {
                (Utc::now() - at).num_seconds() <= self.config.geo_staleness_secs as i64
            }
            None => false,
        }
    }

    /// Put a released driver back into the geo index at their last position.
    async fn reindex_driver(&self, driver_id: Uuid) {
        match self.drivers.find_by_id(driver_id).await {
            Ok(Some(entity)) => {
                let driver: Driver = entity.into();
                if driver.status == DriverStatus::Available && self.position_is_fresh(&driver) {
                    if let (Some((lat, lng)), Some(at)) =
                        (driver.position(), driver.last_location_update)
                    {
                        let meta = DriverMeta {
                            rating: driver.rating,
                            vehicle_type: driver.vehicle_type,
                        };
                        self.presence
                            .set_driver_status(driver.id, DriverStatus::Available, meta)
                            .await;
                        self.geo
                            .add(driver.id, lat, lng, at.timestamp_millis(), meta)
                            .await;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(driver_id = %driver_id, error = %e, "failed to reindex driver"),
        }
    }

    async fn append_event(
        &self,
        ride_id: Uuid,
        event_type: RideEventType,
        payload: serde_json::Value,
    ) {
        if let Err(e) = self.events.append(ride_id, event_type, payload).await {
            warn!(ride_id = %ride_id, event = %event_type, error = %e, "failed to append ride event");
        }
    }

    async fn notify(
        &self,
        recipient_id: Uuid,
        recipient_role: RecipientRole,
        ride_id: Option<Uuid>,
        kind: NotificationKind,
        message: String,
    ) {
        if let Err(e) = self
            .notifications
            .insert(NotificationInput {
                recipient_id,
                recipient_role,
                ride_id,
                kind,
                message,
            })
            .await
        {
            warn!(recipient_id = %recipient_id, kind = %kind, error = %e, "failed to write notification");
        }
    }

    async fn publish_status(&self, ride_id: Uuid, status: RideStatus, driver_id: Option<Uuid>) {
        self.bus
            .publish(
                &ride_topic(ride_id),
                BusEvent::RideStatus {
                    ride_id,
                    status,
                    driver_id,
                },
            )
            .await;
    }
}
