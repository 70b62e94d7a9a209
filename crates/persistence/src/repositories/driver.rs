//! Driver repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::DriverEntity;
use crate::metrics::QueryTimer;
use domain::models::DriverStatus;

const DRIVER_COLUMNS: &str = "id, name, phone, vehicle_model, vehicle_plate, vehicle_type, \
     rating, acceptance_rate, status, total_trips, last_latitude, last_longitude, \
     last_location_update, created_at, updated_at";

/// Repository for driver-related database operations.
#[derive(Clone)]
pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    /// Creates a new DriverRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a driver by id.
    pub async fn find_by_id(&self, driver_id: Uuid) -> Result<Option<DriverEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_driver_by_id");
        let result = sqlx::query_as::<_, DriverEntity>(&format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = $1"
        ))
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Set a driver's status unconditionally.
    pub async fn set_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
    ) -> Result<Option<DriverEntity>, sqlx::Error> {
        sqlx::query_as::<_, DriverEntity>(&format!(
            r#"
            UPDATE drivers
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {DRIVER_COLUMNS}
            "#
        ))
        .bind(driver_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Set a driver's status only if the current status matches `from`.
    ///
    /// Returns the updated row, or None when the precondition failed.
    pub async fn set_status_if(
        &self,
        driver_id: Uuid,
        from: DriverStatus,
        to: DriverStatus,
    ) -> Result<Option<DriverEntity>, sqlx::Error> {
        sqlx::query_as::<_, DriverEntity>(&format!(
            r#"
            UPDATE drivers
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {DRIVER_COLUMNS}
            "#
        ))
        .bind(driver_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_repository_creation() {
        // Actual database tests are integration tests.
        assert!(true);
    }
}
