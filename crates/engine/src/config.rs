//! Engine configuration.
//!
//! Every knob has a serde default so an empty environment yields a working
//! development configuration; production overrides arrive as environment
//! variables (`DATABASE_URL`, `LOCATION_BATCH_SIZE`, ...).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Postgres connection string.
    #[serde(default)]
    pub database_url: String,

    /// Region key used to resolve pricing rows for new rides.
    #[serde(default = "default_region")]
    pub region: String,

    /// Radius of each matching geo query, in kilometres.
    #[serde(default = "default_search_radius_km")]
    pub search_radius_km: f64,

    /// Max candidates pulled per geo query.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Matching attempts before a ride fails.
    #[serde(default = "default_match_max_attempts")]
    pub match_max_attempts: u32,

    /// Sleep between empty matching attempts.
    #[serde(default = "default_match_backoff_ms")]
    pub match_backoff_ms: u64,

    /// TTL on the per-ride matching lock.
    #[serde(default = "default_match_lock_ttl_ms")]
    pub match_lock_ttl_ms: u64,

    /// Geo index entries older than this are evicted by housekeeping.
    #[serde(default = "default_geo_staleness_secs")]
    pub geo_staleness_secs: u64,

    /// Location buffer drain threshold.
    #[serde(default = "default_location_batch_size")]
    pub location_batch_size: usize,

    /// Location buffer drain interval since first queued entry.
    #[serde(default = "default_location_batch_interval_ms")]
    pub location_batch_interval_ms: u64,

    /// Buffer backpressure bound; beyond it, old pings are shed per driver.
    #[serde(default = "default_location_high_water_mark")]
    pub location_high_water_mark: usize,

    /// Backoff before the single flush retry.
    #[serde(default = "default_location_retry_backoff_ms")]
    pub location_retry_backoff_ms: u64,

    /// Days of driver location history retained.
    #[serde(default = "default_location_retention_days")]
    pub location_retention_days: u32,

    /// Payment attempts ceiling (initial attempt included).
    #[serde(default = "default_payment_max_attempts")]
    pub payment_max_attempts: i32,

    /// TTL on cached payment responses.
    #[serde(default = "default_payment_cache_ttl_secs")]
    pub payment_cache_ttl_secs: u64,

    /// Deadline on a single PSP charge call.
    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,

    /// Fallback pricing when no active row covers (region, tier).
    #[serde(default = "default_base_fare")]
    pub default_base_fare: f64,

    #[serde(default = "default_per_km_rate")]
    pub default_per_km_rate: f64,

    #[serde(default = "default_per_min_rate")]
    pub default_per_min_rate: f64,

    /// Capacity of the ride read cache.
    #[serde(default = "default_ride_cache_capacity")]
    pub ride_cache_capacity: usize,
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            region: default_region(),
            search_radius_km: default_search_radius_km(),
            search_limit: default_search_limit(),
            match_max_attempts: default_match_max_attempts(),
            match_backoff_ms: default_match_backoff_ms(),
            match_lock_ttl_ms: default_match_lock_ttl_ms(),
            geo_staleness_secs: default_geo_staleness_secs(),
            location_batch_size: default_location_batch_size(),
            location_batch_interval_ms: default_location_batch_interval_ms(),
            location_high_water_mark: default_location_high_water_mark(),
            location_retry_backoff_ms: default_location_retry_backoff_ms(),
            location_retention_days: default_location_retention_days(),
            payment_max_attempts: default_payment_max_attempts(),
            payment_cache_ttl_secs: default_payment_cache_ttl_secs(),
            gateway_timeout_ms: default_gateway_timeout_ms(),
            default_base_fare: default_base_fare(),
            default_per_km_rate: default_per_km_rate(),
            default_per_min_rate: default_per_min_rate(),
            ride_cache_capacity: default_ride_cache_capacity(),
        }
    }
}

// Default value functions

fn default_region() -> String {
    "mumbai".to_string()
}

fn default_search_radius_km() -> f64 {
    5.0
}

fn default_search_limit() -> usize {
    10
}

fn default_match_max_attempts() -> u32 {
    3
}

fn default_match_backoff_ms() -> u64 {
    5_000
}

fn default_match_lock_ttl_ms() -> u64 {
    10_000
}

fn default_geo_staleness_secs() -> u64 {
    300
}

fn default_location_batch_size() -> usize {
    100
}

fn default_location_batch_interval_ms() -> u64 {
    10_000
}

fn default_location_high_water_mark() -> usize {
    10_000
}

fn default_location_retry_backoff_ms() -> u64 {
    500
}

fn default_location_retention_days() -> u32 {
    30
}

fn default_payment_max_attempts() -> i32 {
    3
}

fn default_payment_cache_ttl_secs() -> u64 {
    3_600
}

fn default_gateway_timeout_ms() -> u64 {
    10_000
}

fn default_base_fare() -> f64 {
    50.0
}

fn default_per_km_rate() -> f64 {
    12.0
}

fn default_per_min_rate() -> f64 {
    2.0
}

fn default_ride_cache_capacity() -> usize {
    4_096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.location_batch_size, 100);
        assert_eq!(config.location_batch_interval_ms, 10_000);
        assert_eq!(config.match_max_attempts, 3);
        assert_eq!(config.match_backoff_ms, 5_000);
        assert_eq!(config.search_limit, 10);
        assert_eq!(config.geo_staleness_secs, 300);
        assert_eq!(config.payment_max_attempts, 3);
    }
}
