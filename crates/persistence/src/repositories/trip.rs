//! Trip repository for database operations.
//!
//! Owns the two multi-row transitions around a trip: creation at pickup
//! (ride DRIVER_ARRIVING → ARRIVED plus trip upsert) and settlement at
//! dropoff (trip, ride, driver, rider, earning, receipt in one transaction).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::TripEntity;
use crate::metrics::QueryTimer;

const TRIP_COLUMNS: &str = "id, ride_id, driver_id, status, start_otp, start_time, end_time, \
     actual_distance_km, route_path, base_fare, per_km_rate, per_min_rate, surge_multiplier, \
     discount, distance_fare, time_fare, surge_amount, final_fare, platform_fee, \
     driver_earnings, created_at, updated_at";

/// Pricing inputs frozen onto the trip row at pickup.
#[derive(Debug, Clone, Copy)]
pub struct PricingSnapshot {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub surge_multiplier: f64,
    pub discount: f64,
}

/// Input data for the settlement transaction.
#[derive(Debug, Clone)]
pub struct SettlementInput {
    pub trip_id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub rider_id: Uuid,
    pub actual_distance_km: f64,
    pub route_path: Option<serde_json::Value>,
    pub end_time: DateTime<Utc>,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_amount: f64,
    pub final_fare: f64,
    pub platform_fee: f64,
    pub driver_earnings: f64,
    pub receipt_tax: f64,
}

/// Repository for trip-related database operations.
#[derive(Clone)]
pub struct TripRepository {
    pool: PgPool,
}

impl TripRepository {
    /// Creates a new TripRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a trip by id.
    pub async fn find_by_id(&self, trip_id: Uuid) -> Result<Option<TripEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_trip_by_id");
        let result = sqlx::query_as::<_, TripEntity>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"
        ))
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find the trip belonging to a ride.
    pub async fn find_by_ride_id(&self, ride_id: Uuid) -> Result<Option<TripEntity>, sqlx::Error> {
        sqlx::query_as::<_, TripEntity>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE ride_id = $1"
        ))
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark the driver arrived: guard the ride DRIVER_ARRIVING → ARRIVED
    /// transition and create (or refresh) the PENDING trip with a new OTP and
    /// frozen pricing, all in one transaction.
    ///
    /// Returns None when the ride was not in DRIVER_ARRIVING for this driver.
    pub async fn create_pending_at_pickup(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        start_otp: &str,
        pricing: PricingSnapshot,
    ) -> Result<Option<TripEntity>, sqlx::Error> {
        let timer = QueryTimer::new("create_pending_trip");
        let mut tx = self.pool.begin().await?;

        let ride_updated = sqlx::query(
            r#"
            UPDATE rides
            SET status = 'ARRIVED', updated_at = NOW()
            WHERE id = $1 AND driver_id = $2 AND status = 'DRIVER_ARRIVING'
            "#,
        )
        .bind(ride_id)
        .bind(driver_id)
        .execute(&mut *tx)
        .await?;

        if ride_updated.rows_affected() == 0 {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        let trip = sqlx::query_as::<_, TripEntity>(&format!(
            r#"
            INSERT INTO trips (
                ride_id, driver_id, status, start_otp,
                base_fare, per_km_rate, per_min_rate, surge_multiplier, discount
            )
            VALUES ($1, $2, 'PENDING', $3, $4, $5, $6, $7, $8)
            ON CONFLICT (ride_id) DO UPDATE SET
                start_otp = EXCLUDED.start_otp,
                updated_at = NOW()
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(ride_id)
        .bind(driver_id)
        .bind(start_otp)
        .bind(pricing.base_fare)
        .bind(pricing.per_km_rate)
        .bind(pricing.per_min_rate)
        .bind(pricing.surge_multiplier)
        .bind(pricing.discount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(trip))
    }

    /// Start a trip after the OTP check: trip PENDING → STARTED and ride
    /// ARRIVED → IN_PROGRESS in one transaction.
    ///
    /// Returns None when either guard rejected the update.
    pub async fn start(&self, trip_id: Uuid) -> Result<Option<TripEntity>, sqlx::Error> {
        let timer = QueryTimer::new("start_trip");
        let mut tx = self.pool.begin().await?;

        let trip = sqlx::query_as::<_, TripEntity>(&format!(
            r#"
            UPDATE trips
            SET status = 'STARTED', start_time = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(trip) = trip else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        let ride_updated = sqlx::query(
            r#"
            UPDATE rides
            SET status = 'IN_PROGRESS', updated_at = NOW()
            WHERE id = $1 AND status = 'ARRIVED'
            "#,
        )
        .bind(trip.ride_id)
        .execute(&mut *tx)
        .await?;

        if ride_updated.rows_affected() == 0 {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        tx.commit().await?;
        timer.record();
        Ok(Some(trip))
    }

    /// Settle a finished trip.
    ///
    /// In one transaction: the trip moves STARTED → COMPLETED with its fare
    /// breakdown, the ride moves IN_PROGRESS → COMPLETED, the driver returns
    /// to AVAILABLE with an incremented trip count, the rider's ride count is
    /// bumped, and the earning and receipt rows are written.
    ///
    /// Returns None when the trip was not in STARTED.
    pub async fn complete_settlement(
        &self,
        input: SettlementInput,
    ) -> Result<Option<TripEntity>, sqlx::Error> {
        let timer = QueryTimer::new("complete_trip_settlement");
        let mut tx = self.pool.begin().await?;

        let trip = sqlx::query_as::<_, TripEntity>(&format!(
            r#"
            UPDATE trips
            SET status = 'COMPLETED', end_time = $2, actual_distance_km = $3, route_path = $4,
                distance_fare = $5, time_fare = $6, surge_amount = $7, final_fare = $8,
                platform_fee = $9, driver_earnings = $10, updated_at = NOW()
            WHERE id = $1 AND status = 'STARTED'
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(input.trip_id)
        .bind(input.end_time)
        .bind(input.actual_distance_km)
        .bind(&input.route_path)
        .bind(input.distance_fare)
        .bind(input.time_fare)
        .bind(input.surge_amount)
        .bind(input.final_fare)
        .bind(input.platform_fee)
        .bind(input.driver_earnings)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(trip) = trip else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE rides
            SET status = 'COMPLETED', updated_at = NOW()
            WHERE id = $1 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(input.ride_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE drivers
            SET status = 'AVAILABLE', total_trips = total_trips + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(input.driver_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE riders
            SET total_rides = total_rides + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(input.rider_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO earnings (driver_id, trip_id, amount, platform_fee)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (trip_id) DO NOTHING
            "#,
        )
        .bind(input.driver_id)
        .bind(input.trip_id)
        .bind(input.driver_earnings)
        .bind(input.platform_fee)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO receipts (trip_id, rider_id, fare_amount, tax_amount, total_amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (trip_id) DO NOTHING
            "#,
        )
        .bind(input.trip_id)
        .bind(input.rider_id)
        .bind(input.final_fare)
        .bind(input.receipt_tax)
        .bind(input.final_fare + input.receipt_tax)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(Some(trip))
    }
}
