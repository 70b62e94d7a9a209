//! Ride event repository for database operations.
//!
//! The ride_events table is append-only; there is no update or delete path.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RideEventEntity;
use domain::models::RideEventType;

/// Repository for ride event database operations.
#[derive(Clone)]
pub struct RideEventRepository {
    pool: PgPool,
}

impl RideEventRepository {
    /// Creates a new RideEventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append an audit event for a ride transition.
    pub async fn append(
        &self,
        ride_id: Uuid,
        event_type: RideEventType,
        payload: serde_json::Value,
    ) -> Result<RideEventEntity, sqlx::Error> {
        sqlx::query_as::<_, RideEventEntity>(
            r#"
            INSERT INTO ride_events (ride_id, event_type, payload)
            VALUES ($1, $2, $3)
            RETURNING id, ride_id, event_type, payload, created_at
            "#,
        )
        .bind(ride_id)
        .bind(event_type.as_str())
        .bind(payload)
        .fetch_one(&self.pool)
        .await
    }

    /// All events for a ride in append order.
    pub async fn list_for_ride(
        &self,
        ride_id: Uuid,
    ) -> Result<Vec<RideEventEntity>, sqlx::Error> {
        sqlx::query_as::<_, RideEventEntity>(
            r#"
            SELECT id, ride_id, event_type, payload, created_at
            FROM ride_events
            WHERE ride_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
    }
}
