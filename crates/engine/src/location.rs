//! Location ingest pipeline.
//!
//! Absorbs high-frequency driver pings: the geo index and live subscribers
//! see each ping immediately, durable persistence happens in batches. A
//! single drain task owns the buffer-to-database path; size triggers and the
//! interval timer both funnel into it, so at most one drain is in flight and
//! extra triggers coalesce.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, error, warn};

use crate::bus::{location_topic, ride_topic, BusEvent, UpdateBus};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geo_index::GeoIndex;
use crate::presence::PresenceRegistry;
use domain::models::{DriverPosition, UpdateDriverLocationRequest};
use persistence::repositories::{DriverLocationInsert, DriverLocationRepository};
use validator::Validate;

struct PingBuffer {
    entries: VecDeque<DriverLocationInsert>,
    first_queued_at: Option<Instant>,
    dropped: u64,
}

/// Buffered, batching ingest path for driver position pings.
pub struct LocationPipeline {
    config: Arc<EngineConfig>,
    geo: Arc<GeoIndex>,
    bus: Arc<UpdateBus>,
    presence: Arc<PresenceRegistry>,
    locations: DriverLocationRepository,
    buffer: Mutex<PingBuffer>,
    flush_signal: Notify,
    drain_gate: Mutex<()>,
}

impl LocationPipeline {
    pub fn new(
        config: Arc<EngineConfig>,
        geo: Arc<GeoIndex>,
        bus: Arc<UpdateBus>,
        presence: Arc<PresenceRegistry>,
        locations: DriverLocationRepository,
    ) -> Self {
        Self {
            config,
            geo,
            bus,
            presence,
            locations,
            buffer: Mutex::new(PingBuffer {
                entries: VecDeque::new(),
                first_queued_at: None,
                dropped: 0,
            }),
            flush_signal: Notify::new(),
            drain_gate: Mutex::new(()),
        }
    }

    /// Ingest one ping.
    ///
    /// Validation failures are the only error path; a ping accepted here is
    /// never rejected later, though it may be shed under backpressure before
    /// persisting. The geo index and live fan-out have already happened by
    /// the time this returns.
    pub async fn record_ping(
        &self,
        request: UpdateDriverLocationRequest,
    ) -> Result<(), EngineError> {
        request.validate()?;

        let now = Utc::now();
        let activity = self.presence.driver_activity(request.driver_id).await;

        // AVAILABLE drivers feed matching, ON_RIDE drivers feed the rider's
        // live map; both need the index current before this call returns.
        if let Some(activity) = activity.filter(|a| a.status.tracks_location()) {
            self.geo
                .add(
                    request.driver_id,
                    request.latitude,
                    request.longitude,
                    now.timestamp_millis(),
                    activity.meta,
                )
                .await;
        }

        let row = DriverLocationInsert {
            driver_id: request.driver_id,
            latitude: request.latitude,
            longitude: request.longitude,
            heading: request.heading,
            speed: request.speed,
            accuracy: request.accuracy,
            recorded_at: now,
        };

        let queued_len = {
            let mut buffer = self.buffer.lock().await;
            if buffer.entries.len() >= self.config.location_high_water_mark {
                shed_oldest(&mut buffer, request.driver_id);
            }
            buffer.entries.push_back(row);
            if buffer.first_queued_at.is_none() {
                buffer.first_queued_at = Some(Instant::now());
            }
            buffer.entries.len()
        };

        metrics::counter!("location_pings_total").increment(1);
        metrics::gauge!("location_buffer_depth").set(queued_len as f64);

        if let Some(ride_id) = activity.and_then(|a| a.active_ride) {
            self.bus
                .publish(
                    &ride_topic(ride_id),
                    BusEvent::DriverLocation {
                        lat: request.latitude,
                        lng: request.longitude,
                    },
                )
                .await;
            self.bus
                .publish(
                    &location_topic(request.driver_id),
                    BusEvent::DriverPing(DriverPosition {
                        driver_id: request.driver_id,
                        latitude: request.latitude,
                        longitude: request.longitude,
                        heading: request.heading,
                        speed: request.speed,
                        accuracy: request.accuracy,
                        recorded_at: now,
                    }),
                )
                .await;
        }

        if queued_len >= self.config.location_batch_size {
            self.flush_signal.notify_one();
        }

        Ok(())
    }

    /// Run the drain worker until shutdown flips.
    ///
    /// The worker drains on size signals and when the oldest queued entry has
    /// waited a full batch interval; shutdown performs a final flush.
    pub async fn run_worker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let tick = Duration::from_millis((self.config.location_batch_interval_ms / 4).max(10));
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.flush_signal.notified() => {
                    self.drain().await;
                }
                _ = interval.tick() => {
                    if self.interval_elapsed().await {
                        self.drain().await;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.drain().await;
                        debug!("location pipeline worker stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Drain everything currently buffered into one batched insert.
    ///
    /// Public so shutdown paths and tests can force a flush; concurrent
    /// callers serialize on the drain gate.
    pub async fn drain(&self) {
        let _gate = self.drain_gate.lock().await;

        let batch: Vec<DriverLocationInsert> = {
            let mut buffer = self.buffer.lock().await;
            buffer.first_queued_at = None;
            buffer.entries.drain(..).collect()
        };

        if batch.is_empty() {
            return;
        }

        match self.persist_with_retry(&batch).await {
            Ok(()) => {
                metrics::counter!("location_pings_persisted_total").increment(batch.len() as u64);
                metrics::counter!("location_flushes_total").increment(1);
            }
            Err(e) => {
                metrics::counter!("location_flush_failures_total").increment(1);
                metrics::counter!("location_pings_lost_total").increment(batch.len() as u64);
                error!(error = %e, batch_len = batch.len(), "location flush dropped after retry");
            }
        }
    }

    async fn persist_with_retry(&self, batch: &[DriverLocationInsert]) -> Result<(), sqlx::Error> {
        match self.locations.insert_batch(batch).await {
            Ok(_) => Ok(()),
            Err(first_err) => {
                warn!(error = %first_err, "location flush failed, retrying once");
                tokio::time::sleep(Duration::from_millis(self.config.location_retry_backoff_ms))
                    .await;
                self.locations.insert_batch(batch).await.map(|_| ())
            }
        }
    }

    async fn interval_elapsed(&self) -> bool {
        let buffer = self.buffer.lock().await;
        match buffer.first_queued_at {
            Some(first) => {
                first.elapsed() >= Duration::from_millis(self.config.location_batch_interval_ms)
            }
            None => false,
        }
    }

    /// Number of pings currently buffered.
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.entries.len()
    }

    /// Pings shed under backpressure since startup.
    pub async fn dropped(&self) -> u64 {
        self.buffer.lock().await.dropped
    }

    #[cfg(test)]
    async fn take_buffered(&self) -> Vec<DriverLocationInsert> {
        let mut buffer = self.buffer.lock().await;
        buffer.first_queued_at = None;
        buffer.entries.drain(..).collect()
    }
}

/// Shed one entry to make room: the oldest ping of the same driver if any
/// (position tracking is naturally lossy per driver), else the global oldest.
fn shed_oldest(buffer: &mut PingBuffer, driver_id: uuid::Uuid) {
    let position = buffer
        .entries
        .iter()
        .position(|entry| entry.driver_id == driver_id);
    match position {
        Some(index) => {
            buffer.entries.remove(index);
        }
        None => {
            buffer.entries.pop_front();
        }
    }
    buffer.dropped += 1;
    metrics::counter!("location_pings_dropped_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{DriverStatus, RideType};
    use sqlx::PgPool;
    use uuid::Uuid;

    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool")
    }

    fn pipeline_with(config: EngineConfig) -> (Arc<LocationPipeline>, Arc<PresenceRegistry>, Arc<UpdateBus>, Arc<GeoIndex>) {
        let config = Arc::new(config);
        let geo = Arc::new(GeoIndex::new());
        let bus = Arc::new(UpdateBus::new());
        let presence = Arc::new(PresenceRegistry::new());
        let pipeline = Arc::new(LocationPipeline::new(
            Arc::clone(&config),
            Arc::clone(&geo),
            Arc::clone(&bus),
            Arc::clone(&presence),
            DriverLocationRepository::new(lazy_pool()),
        ));
        (pipeline, presence, bus, geo)
    }

    fn ping(driver_id: Uuid, lat: f64) -> UpdateDriverLocationRequest {
        UpdateDriverLocationRequest {
            driver_id,
            latitude: lat,
            longitude: 72.8295,
            heading: None,
            speed: Some(8.0),
            accuracy: Some(5.0),
        }
    }

    fn meta() -> crate::geo_index::DriverMeta {
        crate::geo_index::DriverMeta {
            rating: 4.9,
            vehicle_type: RideType::Standard,
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_coordinates() {
        let (pipeline, _, _, _) = pipeline_with(EngineConfig::default());
        let driver = Uuid::new_v4();

        let mut bad = ping(driver, 19.05);
        bad.latitude = 91.0;
        let result = pipeline.record_ping(bad).await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));

        let mut bad = ping(driver, 19.05);
        bad.speed = Some(-2.0);
        assert!(pipeline.record_ping(bad).await.is_err());

        assert_eq!(pipeline.buffered().await, 0);
    }

    #[tokio::test]
    async fn test_buffers_in_arrival_order() {
        let (pipeline, _, _, _) = pipeline_with(EngineConfig::default());
        let d1 = Uuid::from_u128(1);
        let d2 = Uuid::from_u128(2);

        pipeline.record_ping(ping(d1, 19.01)).await.unwrap();
        pipeline.record_ping(ping(d2, 19.02)).await.unwrap();
        pipeline.record_ping(ping(d1, 19.03)).await.unwrap();

        let batch = pipeline.take_buffered().await;
        assert_eq!(batch.len(), 3);
        // Per-driver order preserved in buffer order.
        let d1_lats: Vec<f64> = batch
            .iter()
            .filter(|r| r.driver_id == d1)
            .map(|r| r.latitude)
            .collect();
        assert_eq!(d1_lats, vec![19.01, 19.03]);
    }

    #[tokio::test]
    async fn test_geo_updated_only_for_tracked_statuses() {
        let (pipeline, presence, _, geo) = pipeline_with(EngineConfig::default());
        let tracked = Uuid::from_u128(1);
        let off_duty = Uuid::from_u128(2);
        let unknown = Uuid::from_u128(3);

        presence
            .set_driver_status(tracked, DriverStatus::Available, meta())
            .await;
        presence
            .set_driver_status(off_duty, DriverStatus::Break, meta())
            .await;

        pipeline.record_ping(ping(tracked, 19.05)).await.unwrap();
        pipeline.record_ping(ping(off_duty, 19.06)).await.unwrap();
        pipeline.record_ping(ping(unknown, 19.07)).await.unwrap();

        assert!(geo.position(tracked).await.is_some());
        assert!(geo.position(off_duty).await.is_none());
        assert!(geo.position(unknown).await.is_none());
        // All three still buffered for persistence.
        assert_eq!(pipeline.buffered().await, 3);
    }

    #[tokio::test]
    async fn test_fan_out_only_on_active_ride() {
        let (pipeline, presence, bus, _) = pipeline_with(EngineConfig::default());
        let on_ride = Uuid::from_u128(1);
        let idle = Uuid::from_u128(2);
        let ride_id = Uuid::from_u128(99);

        presence
            .set_driver_status(on_ride, DriverStatus::Available, meta())
            .await;
        presence.set_driver_on_ride(on_ride, ride_id).await;
        presence
            .set_driver_status(idle, DriverStatus::Available, meta())
            .await;

        let mut ride_sub = bus.subscribe(&ride_topic(ride_id)).await;
        let mut loc_sub = bus.subscribe(&location_topic(on_ride)).await;
        let mut idle_sub = bus.subscribe(&location_topic(idle)).await;

        for i in 0..5 {
            pipeline
                .record_ping(ping(on_ride, 19.05 + i as f64 * 0.001))
                .await
                .unwrap();
            pipeline
                .record_ping(ping(idle, 18.95 + i as f64 * 0.001))
                .await
                .unwrap();
        }

        assert_eq!(ride_sub.drain().len(), 5);
        assert_eq!(loc_sub.drain().len(), 5);
        assert!(idle_sub.drain().is_empty());
    }

    #[tokio::test]
    async fn test_backpressure_sheds_same_driver_first() {
        let config = EngineConfig {
            location_high_water_mark: 4,
            location_batch_size: 1_000,
            ..EngineConfig::default()
        };
        let (pipeline, _, _, _) = pipeline_with(config);
        let noisy = Uuid::from_u128(1);
        let quiet = Uuid::from_u128(2);

        pipeline.record_ping(ping(quiet, 18.90)).await.unwrap();
        for i in 0..8 {
            pipeline
                .record_ping(ping(noisy, 19.0 + i as f64 * 0.001))
                .await
                .unwrap();
        }

        // Capacity respected (high water + the newest push).
        assert!(pipeline.buffered().await <= 5);
        assert!(pipeline.dropped().await >= 4);

        let batch = pipeline.take_buffered().await;
        // The quiet driver's single ping survived; the noisy driver lost
        // oldest entries but kept the newest.
        assert!(batch.iter().any(|r| r.driver_id == quiet));
        let noisy_lats: Vec<f64> = batch
            .iter()
            .filter(|r| r.driver_id == noisy)
            .map(|r| r.latitude)
            .collect();
        let newest = 19.0 + 7.0 * 0.001;
        assert!((noisy_lats.last().unwrap() - newest).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_size_trigger_signals_flush() {
        let config = EngineConfig {
            location_batch_size: 3,
            ..EngineConfig::default()
        };
        let (pipeline, _, _, _) = pipeline_with(config);

        for i in 0..3 {
            pipeline
                .record_ping(ping(Uuid::from_u128(1), 19.0 + i as f64 * 0.001))
                .await
                .unwrap();
        }

        // The signal is pending; a worker would drain immediately.
        let notified = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.flush_signal.notified(),
        )
        .await;
        assert!(notified.is_ok());
    }
}
