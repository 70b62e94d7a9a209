//! Entity definitions (database row mappings).

pub mod driver;
pub mod driver_location;
pub mod earning;
pub mod notification;
pub mod payment;
pub mod pricing_config;
pub mod receipt;
pub mod refund;
pub mod ride;
pub mod ride_event;
pub mod rider;
pub mod surge_zone;
pub mod trip;

pub use driver::DriverEntity;
pub use driver_location::DriverLocationEntity;
pub use earning::EarningEntity;
pub use notification::NotificationEntity;
pub use payment::PaymentEntity;
pub use pricing_config::PricingConfigEntity;
pub use receipt::ReceiptEntity;
pub use refund::RefundEntity;
pub use ride::RideEntity;
pub use ride_event::RideEventEntity;
pub use rider::RiderEntity;
pub use surge_zone::SurgeZoneEntity;
pub use trip::TripEntity;
