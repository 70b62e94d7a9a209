//! Background jobs for the ride engine.

pub mod cleanup_locations;
pub mod pool_metrics;
pub mod scheduler;
pub mod sweep;

pub use cleanup_locations::CleanupLocationsJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use sweep::HousekeepingSweepJob;
