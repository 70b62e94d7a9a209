//! Driver location retention cleanup job.

use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};
use persistence::repositories::DriverLocationRepository;

/// Deletes driver location rows past the retention window in batches so the
/// hot table never takes a long lock.
pub struct CleanupLocationsJob {
    locations: DriverLocationRepository,
    retention_days: u32,
    batch_size: i64,
}

impl CleanupLocationsJob {
    pub fn new(pool: PgPool, retention_days: u32) -> Self {
        Self {
            locations: DriverLocationRepository::new(pool),
            retention_days,
            batch_size: 10_000,
        }
    }
}

#[async_trait::async_trait]
impl Job for CleanupLocationsJob {
    fn name(&self) -> &'static str {
        "cleanup_locations"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let mut total_deleted: u64 = 0;

        loop {
            let deleted = self
                .locations
                .delete_older_than(self.retention_days, self.batch_size)
                .await
                .map_err(|e| format!("location cleanup failed: {}", e))?;

            total_deleted += deleted;

            if deleted < self.batch_size as u64 {
                break;
            }

            tokio::task::yield_now().await;
        }

        if total_deleted > 0 {
            info!(
                deleted = total_deleted,
                retention_days = self.retention_days,
                "old driver locations deleted"
            );
        }
        metrics::counter!("location_rows_deleted_total").increment(total_deleted);
        Ok(())
    }
}
