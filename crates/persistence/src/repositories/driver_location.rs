//! Driver location repository for database operations.
//!
//! The write path is the batched flush from the location ingest pipeline;
//! the read path is cursor-paginated history over the time-partitioned table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::DriverLocationEntity;
use crate::metrics::QueryTimer;

/// Input data for one buffered ping row.
#[derive(Debug, Clone)]
pub struct DriverLocationInsert {
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Query parameters for location history with cursor-based pagination.
#[derive(Debug, Clone)]
pub struct LocationHistoryQuery {
    pub driver_id: Uuid,
    /// Cursor position (from a decoded cursor), newest-first.
    pub cursor_timestamp: Option<DateTime<Utc>>,
    pub cursor_id: Option<i64>,
    pub from_timestamp: Option<DateTime<Utc>>,
    pub to_timestamp: Option<DateTime<Utc>>,
    pub limit: i32,
}

/// Repository for driver location database operations.
#[derive(Clone)]
pub struct DriverLocationRepository {
    pool: PgPool,
}

impl DriverLocationRepository {
    /// Creates a new DriverLocationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a flushed batch of pings within a transaction.
    ///
    /// Rows are inserted in buffer order so per-driver ping order survives
    /// persistence. Each driver's last-known position on the drivers row is
    /// refreshed to the newest ping in the batch.
    pub async fn insert_batch(
        &self,
        batch: &[DriverLocationInsert],
    ) -> Result<usize, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let timer = QueryTimer::new("insert_locations_batch");
        let mut tx = self.pool.begin().await?;

        for row in batch {
            sqlx::query(
                r#"
                INSERT INTO driver_locations (
                    driver_id, latitude, longitude, heading, speed, accuracy, recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(row.driver_id)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(row.heading.map(|h| h as f32)) // heading is REAL (f32) in schema
            .bind(row.speed.map(|s| s as f32)) // speed is REAL (f32) in schema
            .bind(row.accuracy.map(|a| a as f32)) // accuracy is REAL (f32) in schema
            .bind(row.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        // Latest ping per driver wins the drivers-row refresh; the batch is
        // in arrival order, so the last occurrence is the newest.
        for row in latest_per_driver(batch) {
            sqlx::query(
                r#"
                UPDATE drivers
                SET last_latitude = $2, last_longitude = $3, last_location_update = $4,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(row.driver_id)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(row.recorded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(batch.len())
    }

    /// Get location history for a driver, newest first, cursor-paginated.
    ///
    /// Returns `(rows, has_more)`.
    pub async fn get_history(
        &self,
        query: LocationHistoryQuery,
    ) -> Result<(Vec<DriverLocationEntity>, bool), sqlx::Error> {
        let timer = QueryTimer::new("get_location_history");

        // Fetch limit + 1 to determine if more results exist.
        let fetch_limit = (query.limit + 1) as i64;

        let rows = sqlx::query_as::<_, DriverLocationEntity>(
            r#"
            SELECT id, driver_id, latitude, longitude, heading, speed, accuracy,
                   recorded_at, created_at
            FROM driver_locations
            WHERE driver_id = $1
              AND ($2::timestamptz IS NULL OR recorded_at >= $2)
              AND ($3::timestamptz IS NULL OR recorded_at <= $3)
              AND ($4::timestamptz IS NULL OR (recorded_at, id) < ($4, $5))
            ORDER BY recorded_at DESC, id DESC
            LIMIT $6
            "#,
        )
        .bind(query.driver_id)
        .bind(query.from_timestamp)
        .bind(query.to_timestamp)
        .bind(query.cursor_timestamp)
        .bind(query.cursor_id.unwrap_or(i64::MAX))
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        timer.record();

        let has_more = rows.len() > query.limit as usize;
        let mut result = rows;
        if has_more {
            result.pop();
        }

        Ok((result, has_more))
    }

    /// Delete up to `batch_size` location rows older than the retention
    /// window. Returns the number of deleted records; callers loop until the
    /// count comes back short.
    pub async fn delete_older_than(
        &self,
        retention_days: u32,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            WITH to_delete AS (
                SELECT id FROM driver_locations
                WHERE created_at < NOW() - make_interval(days => $1)
                LIMIT $2
            )
            DELETE FROM driver_locations
            WHERE id IN (SELECT id FROM to_delete)
            "#,
        )
        .bind(retention_days as i32)
        .bind(batch_size)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn latest_per_driver(batch: &[DriverLocationInsert]) -> Vec<&DriverLocationInsert> {
    let mut latest: Vec<&DriverLocationInsert> = Vec::new();
    for row in batch {
        if let Some(existing) = latest.iter_mut().find(|r| r.driver_id == row.driver_id) {
            *existing = row;
        } else {
            latest.push(row);
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_row(driver_id: Uuid, lat: f64) -> DriverLocationInsert {
        DriverLocationInsert {
            driver_id,
            latitude: lat,
            longitude: 72.8295,
            heading: None,
            speed: None,
            accuracy: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_latest_per_driver_keeps_last_occurrence() {
        let d1 = Uuid::from_u128(1);
        let d2 = Uuid::from_u128(2);
        let batch = vec![
            insert_row(d1, 19.01),
            insert_row(d2, 19.02),
            insert_row(d1, 19.03),
        ];

        let latest = latest_per_driver(&batch);
        assert_eq!(latest.len(), 2);
        let d1_latest = latest.iter().find(|r| r.driver_id == d1).unwrap();
        assert_eq!(d1_latest.latitude, 19.03);
    }

    #[test]
    fn test_latest_per_driver_empty() {
        assert!(latest_per_driver(&[]).is_empty());
    }
}
