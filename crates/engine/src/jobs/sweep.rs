//! Housekeeping sweep over the in-memory components.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::scheduler::{Job, JobFrequency};
use crate::bus::UpdateBus;
use crate::geo_index::GeoIndex;
use crate::idempotency::IdempotencyStore;
use crate::lock::LockService;

/// Evicts stale geo entries, expired locks and cached responses, and idle
/// bus topics.
pub struct HousekeepingSweepJob {
    geo: Arc<GeoIndex>,
    locks: Arc<LockService>,
    idempotency: Arc<IdempotencyStore>,
    bus: Arc<UpdateBus>,
    geo_staleness_secs: u64,
}

impl HousekeepingSweepJob {
    pub fn new(
        geo: Arc<GeoIndex>,
        locks: Arc<LockService>,
        idempotency: Arc<IdempotencyStore>,
        bus: Arc<UpdateBus>,
        geo_staleness_secs: u64,
    ) -> Self {
        Self {
            geo,
            locks,
            idempotency,
            bus,
            geo_staleness_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for HousekeepingSweepJob {
    fn name(&self) -> &'static str {
        "housekeeping_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), String> {
        let now_ms = Utc::now().timestamp_millis();
        let evicted = self
            .geo
            .evict_stale(now_ms, (self.geo_staleness_secs * 1000) as i64)
            .await;
        let locks_purged = self.locks.purge_expired().await;
        let responses_purged = self.idempotency.purge_expired().await;
        let topics_pruned = self.bus.prune_idle_topics().await;

        metrics::counter!("geo_entries_evicted_total").increment(evicted as u64);
        metrics::gauge!("geo_index_size").set(self.geo.len().await as f64);
        metrics::gauge!("bus_topic_count").set(self.bus.topic_count().await as f64);

        debug!(
            evicted,
            locks_purged, responses_purged, topics_pruned, "housekeeping sweep done"
        );
        Ok(())
    }
}
