//! Ride read cache.
//!
//! Eventually consistent: every mutation invalidates, readers may observe a
//! value at most as stale as the last missed invalidation. Authoritative
//! decisions always read from the database inside a transaction.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use uuid::Uuid;

use domain::models::Ride;

/// LRU cache of ride projections keyed by ride id.
pub struct RideCache {
    inner: Mutex<LruCache<Uuid, Ride>>,
}

impl RideCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is non-zero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, ride_id: Uuid) -> Option<Ride> {
        self.inner
            .lock()
            .expect("ride cache lock poisoned")
            .get(&ride_id)
            .cloned()
    }

    pub fn put(&self, ride: Ride) {
        self.inner
            .lock()
            .expect("ride cache lock poisoned")
            .put(ride.id, ride);
    }

    pub fn invalidate(&self, ride_id: Uuid) {
        self.inner
            .lock()
            .expect("ride cache lock poisoned")
            .pop(&ride_id);
    }
}
