//! Ride lifecycle engine.
//!
//! The transport-agnostic core of the ride platform: driver matching over an
//! in-memory geo index, the ride/trip state machine, high-frequency location
//! ingest with batched persistence, idempotent fare settlement, and the
//! pub/sub bus that keeps riders and drivers informed in real time.
//!
//! The embedding process owns the HTTP/socket surface, telemetry export, and
//! PSP credentials; it hands the engine a database pool, a configuration, and
//! a [`domain::services::PaymentGateway`] implementation.

pub mod bus;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo_index;
pub mod idempotency;
pub mod jobs;
pub mod location;
pub mod lock;
pub mod matching;
pub mod payments;
pub mod presence;
pub mod surge;
pub mod telemetry;

pub use bus::{location_topic, ride_topic, BusEvent, UpdateBus};
pub use config::EngineConfig;
pub use engine::{ArrivalInfo, RideEngine};
pub use error::EngineError;
pub use geo_index::{DriverMeta, GeoCandidate, GeoIndex};
pub use idempotency::IdempotencyStore;
pub use location::LocationPipeline;
pub use lock::{LockService, LockToken};
pub use presence::{DriverActivity, PresenceRegistry};
