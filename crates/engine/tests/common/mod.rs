//! Common test utilities for engine integration tests.
//!
//! These tests exercise the engine against a real PostgreSQL database. They
//! skip silently unless `TEST_DATABASE_URL` points at one, so the unit suite
//! stays green on machines without Postgres.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{DriverStatus, RideType, UpdateDriverAvailabilityRequest};
use domain::services::MockPaymentGateway;
use ride_engine::{EngineConfig, RideEngine};

/// Connect to the test database, or None when the suite should skip.
pub async fn try_test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&url)
        .await
        .expect("TEST_DATABASE_URL is set but unreachable");

    sqlx::migrate!("../persistence/migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    Some(pool)
}

/// Engine configuration tuned for fast tests.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        match_backoff_ms: 40,
        match_max_attempts: 3,
        location_batch_size: 100,
        location_batch_interval_ms: 200,
        gateway_timeout_ms: 2_000,
        region: "mumbai".to_string(),
        ..EngineConfig::default()
    }
}

/// Build an engine over the given pool with a scripted mock gateway.
pub fn test_engine(pool: PgPool, gateway: Arc<MockPaymentGateway>) -> Arc<RideEngine> {
    RideEngine::new(pool, test_config(), gateway)
}

fn unique_phone() -> String {
    let digits = Uuid::new_v4().as_u128() % 9_000_000_000u128 + 1_000_000_000;
    format!("+91{}", digits)
}

/// Insert a rider row.
pub async fn seed_rider(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO riders (name, phone, rating)
        VALUES ($1, $2, 4.8)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(unique_phone())
    .fetch_one(pool)
    .await
    .expect("seed rider")
}

/// Insert a driver row with a fresh last-known position.
pub async fn seed_driver(
    pool: &PgPool,
    name: &str,
    lat: f64,
    lng: f64,
    rating: f64,
) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO drivers (
            name, phone, vehicle_model, vehicle_plate, vehicle_type, rating,
            status, last_latitude, last_longitude, last_location_update
        )
        VALUES ($1, $2, 'Maruti Dzire', $3, 'STANDARD', $4, 'OFFLINE', $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(unique_phone())
    .bind(format!("MH01{}", &Uuid::new_v4().simple().to_string()[..6]))
    .bind(rating)
    .bind(lat)
    .bind(lng)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .expect("seed driver")
}

/// Mark a driver available through the engine so presence and the geo index
/// pick them up.
pub async fn bring_driver_online(engine: &RideEngine, driver_id: Uuid) {
    engine
        .update_driver_availability(UpdateDriverAvailabilityRequest {
            driver_id,
            status: DriverStatus::Available,
        })
        .await
        .expect("driver online");
}

/// Upsert the active pricing row for (mumbai, STANDARD).
pub async fn seed_pricing(pool: &PgPool, base: f64, per_km: f64, per_min: f64) {
    sqlx::query(
        r#"
        INSERT INTO pricing_configs (region, ride_type, base_fare, per_km_rate, per_min_rate, is_active)
        VALUES ('mumbai', $1, $2, $3, $4, TRUE)
        ON CONFLICT (region, ride_type) DO UPDATE SET
            base_fare = EXCLUDED.base_fare,
            per_km_rate = EXCLUDED.per_km_rate,
            per_min_rate = EXCLUDED.per_min_rate,
            is_active = TRUE
        "#,
    )
    .bind(RideType::Standard.as_str())
    .bind(base)
    .bind(per_km)
    .bind(per_min)
    .execute(pool)
    .await
    .expect("seed pricing");
}

/// Activate a region-wide surge multiplier (deactivating other zones first).
pub async fn seed_surge(pool: &PgPool, multiplier: f64) {
    sqlx::query("UPDATE surge_zones SET is_active = FALSE")
        .execute(pool)
        .await
        .expect("deactivate zones");
    sqlx::query(
        r#"
        INSERT INTO surge_zones (name, polygon, multiplier, is_active)
        VALUES ($1, NULL, $2, TRUE)
        "#,
    )
    .bind(format!("test-surge-{}", Uuid::new_v4().simple()))
    .bind(multiplier)
    .execute(pool)
    .await
    .expect("seed surge");
}

/// Clear all surge zones so later tests see multiplier 1.0.
pub async fn clear_surge(pool: &PgPool) {
    sqlx::query("UPDATE surge_zones SET is_active = FALSE")
        .execute(pool)
        .await
        .expect("clear surge");
}

/// Poll until `check` yields Some, or panic after `timeout`.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Current driver status straight from the database.
pub async fn driver_status(pool: &PgPool, driver_id: Uuid) -> String {
    sqlx::query_scalar::<_, String>("SELECT status FROM drivers WHERE id = $1")
        .bind(driver_id)
        .fetch_one(pool)
        .await
        .expect("driver status")
}
