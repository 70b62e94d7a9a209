//! Rider repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RiderEntity;

/// Repository for rider-related database operations.
#[derive(Clone)]
pub struct RiderRepository {
    pool: PgPool,
}

impl RiderRepository {
    /// Creates a new RiderRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a rider by id.
    pub async fn find_by_id(&self, rider_id: Uuid) -> Result<Option<RiderEntity>, sqlx::Error> {
        sqlx::query_as::<_, RiderEntity>(
            r#"
            SELECT id, name, phone, email, rating, total_rides, created_at, updated_at
            FROM riders
            WHERE id = $1
            "#,
        )
        .bind(rider_id)
        .fetch_optional(&self.pool)
        .await
    }
}
