//! Surge zone repository for database operations.

use sqlx::PgPool;

use crate::entities::SurgeZoneEntity;

/// Repository for surge zone reads.
#[derive(Clone)]
pub struct SurgeZoneRepository {
    pool: PgPool,
}

impl SurgeZoneRepository {
    /// Creates a new SurgeZoneRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All currently active surge zones.
    pub async fn list_active(&self) -> Result<Vec<SurgeZoneEntity>, sqlx::Error> {
        sqlx::query_as::<_, SurgeZoneEntity>(
            r#"
            SELECT id, name, polygon, multiplier, is_active, created_at, updated_at
            FROM surge_zones
            WHERE is_active = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
