//! Repository implementations for database operations.

pub mod driver;
pub mod driver_location;
pub mod notification;
pub mod payment;
pub mod pricing_config;
pub mod ride;
pub mod ride_event;
pub mod rider;
pub mod surge_zone;
pub mod trip;

pub use driver::DriverRepository;
pub use driver_location::{DriverLocationInsert, DriverLocationRepository, LocationHistoryQuery};
pub use notification::{NotificationInput, NotificationRepository};
pub use payment::{PaymentInput, PaymentRepository};
pub use pricing_config::PricingConfigRepository;
pub use ride::{MatchAttempt, RideInput, RideRepository};
pub use ride_event::RideEventRepository;
pub use rider::RiderRepository;
pub use surge_zone::SurgeZoneRepository;
pub use trip::{PricingSnapshot, SettlementInput, TripRepository};
