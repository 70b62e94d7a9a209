//! Domain models for the ride platform.

pub mod driver;
pub mod earning;
pub mod location;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod receipt;
pub mod ride;
pub mod ride_event;
pub mod rider;
pub mod surge_zone;
pub mod trip;

pub use driver::{Driver, DriverStatus, UpdateDriverAvailabilityRequest};
pub use earning::Earning;
pub use location::{DriverPosition, UpdateDriverLocationRequest};
pub use notification::{Notification, NotificationKind, RecipientRole};
pub use payment::{
    Payment, PaymentStatus, ProcessPaymentRequest, Refund, RefundPaymentRequest,
    RefundPaymentResponse,
};
pub use pricing::PricingConfig;
pub use receipt::Receipt;
pub use ride::{
    AcceptRideResponse, CancelRideRequest, CancelledBy, CreateRideRequest, LocationPoint, Ride,
    RideStatus, RideType,
};
pub use ride_event::{RideEvent, RideEventType};
pub use rider::Rider;
pub use surge_zone::SurgeZone;
pub use trip::{EndTripRequest, StartTripRequest, Trip, TripStatus};
