//! Pricing config repository for database operations.

use sqlx::PgPool;

use crate::entities::PricingConfigEntity;
use domain::models::RideType;

/// Repository for pricing configuration reads.
#[derive(Clone)]
pub struct PricingConfigRepository {
    pool: PgPool,
}

impl PricingConfigRepository {
    /// Creates a new PricingConfigRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find the active pricing row for a (region, tier) tuple.
    pub async fn find_active(
        &self,
        region: &str,
        ride_type: RideType,
    ) -> Result<Option<PricingConfigEntity>, sqlx::Error> {
        sqlx::query_as::<_, PricingConfigEntity>(
            r#"
            SELECT id, region, ride_type, base_fare, per_km_rate, per_min_rate,
                   is_active, created_at, updated_at
            FROM pricing_configs
            WHERE region = $1 AND ride_type = $2 AND is_active = TRUE
            "#,
        )
        .bind(region)
        .bind(ride_type.as_str())
        .fetch_optional(&self.pool)
        .await
    }
}
