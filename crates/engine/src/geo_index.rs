//! In-memory geospatial index of available drivers.
//!
//! Positions land in H3 cell buckets held in a sorted map; a radius query
//! walks the grid disk covering the radius, then ranks hits by true
//! great-circle distance. Concurrent writers for the same driver resolve
//! last-writer-wins by caller-supplied timestamp.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use h3o::{CellIndex, LatLng, Resolution};
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::models::RideType;
use shared::geo::{haversine_km, Coordinates};

/// Index resolution; cells are roughly 460 m across.
const INDEX_RESOLUTION: Resolution = Resolution::Eight;

/// Approximate centre-to-centre spacing of adjacent cells at the index
/// resolution, used to size grid disks.
const CELL_SPACING_KM: f64 = 0.8;

/// Upper bound on disk size so a huge radius cannot blow up a query.
const MAX_GRID_RINGS: u32 = 64;

/// Attribute bag carried with each indexed driver for match-time filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverMeta {
    pub rating: f64,
    pub vehicle_type: RideType,
}

/// A radius query hit.
#[derive(Debug, Clone, Copy)]
pub struct GeoCandidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub meta: DriverMeta,
}

#[derive(Debug, Clone, Copy)]
struct GeoEntry {
    position: Coordinates,
    cell: CellIndex,
    timestamp_ms: i64,
    meta: DriverMeta,
}

#[derive(Default)]
struct GeoState {
    cells: BTreeMap<CellIndex, BTreeSet<Uuid>>,
    drivers: HashMap<Uuid, GeoEntry>,
}

impl GeoState {
    fn unlink(&mut self, driver_id: Uuid, cell: CellIndex) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            bucket.remove(&driver_id);
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }
}

/// Concurrent in-memory driver position index.
///
/// All operations are infallible: invalid coordinates are ignored on insert
/// and a query against an empty index returns the empty sequence.
pub struct GeoIndex {
    state: RwLock<GeoState>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GeoState::default()),
        }
    }

    /// Insert or move a driver.
    ///
    /// `timestamp_ms` orders concurrent updates for the same driver; a stale
    /// write (older timestamp than the stored entry) is dropped.
    pub async fn add(
        &self,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
        timestamp_ms: i64,
        meta: DriverMeta,
    ) {
        let Ok(latlng) = LatLng::new(latitude, longitude) else {
            return;
        };
        let cell = latlng.to_cell(INDEX_RESOLUTION);

        let mut state = self.state.write().await;

        if let Some(existing) = state.drivers.get(&driver_id) {
            if existing.timestamp_ms > timestamp_ms {
                return;
            }
            let old_cell = existing.cell;
            if old_cell != cell {
                state.unlink(driver_id, old_cell);
            }
        }

        state.cells.entry(cell).or_default().insert(driver_id);
        state.drivers.insert(
            driver_id,
            GeoEntry {
                position: Coordinates::new(latitude, longitude),
                cell,
                timestamp_ms,
                meta,
            },
        );
    }

    /// Remove a driver. Idempotent.
    pub async fn remove(&self, driver_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.drivers.remove(&driver_id) {
            state.unlink(driver_id, entry.cell);
        }
    }

    /// Drivers within `radius_km` of the point, ascending by great-circle
    /// distance, ties broken by driver id ascending, at most `limit` results.
    pub async fn query(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> Vec<GeoCandidate> {
        let Ok(origin) = LatLng::new(latitude, longitude) else {
            return Vec::new();
        };
        if radius_km <= 0.0 || limit == 0 {
            return Vec::new();
        }

        let origin_cell = origin.to_cell(INDEX_RESOLUTION);
        let rings = ((radius_km / CELL_SPACING_KM).ceil() as u32 + 1).min(MAX_GRID_RINGS);
        let disk: Vec<CellIndex> = origin_cell.grid_disk(rings);

        let point = Coordinates::new(latitude, longitude);
        let state = self.state.read().await;

        let mut hits: Vec<GeoCandidate> = Vec::new();
        for cell in disk {
            let Some(bucket) = state.cells.get(&cell) else {
                continue;
            };
            for driver_id in bucket {
                if let Some(entry) = state.drivers.get(driver_id) {
                    let distance_km = haversine_km(point, entry.position);
                    if distance_km <= radius_km {
                        hits.push(GeoCandidate {
                            driver_id: *driver_id,
                            distance_km,
                            meta: entry.meta,
                        });
                    }
                }
            }
        }

        hits.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.driver_id.cmp(&b.driver_id))
        });
        hits.truncate(limit);
        hits
    }

    /// Last indexed position of a driver.
    pub async fn position(&self, driver_id: Uuid) -> Option<(f64, f64)> {
        let state = self.state.read().await;
        state
            .drivers
            .get(&driver_id)
            .map(|e| (e.position.latitude, e.position.longitude))
    }

    /// Number of indexed drivers.
    pub async fn len(&self) -> usize {
        self.state.read().await.drivers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evict entries whose timestamp is older than `now_ms - max_age_ms`.
    ///
    /// Returns the number of evicted drivers.
    pub async fn evict_stale(&self, now_ms: i64, max_age_ms: i64) -> usize {
        let mut state = self.state.write().await;
        let cutoff = now_ms - max_age_ms;
        let stale: Vec<(Uuid, CellIndex)> = state
            .drivers
            .iter()
            .filter(|(_, entry)| entry.timestamp_ms < cutoff)
            .map(|(id, entry)| (*id, entry.cell))
            .collect();

        for (driver_id, cell) in &stale {
            state.drivers.remove(driver_id);
            state.unlink(*driver_id, *cell);
        }
        stale.len()
    }
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(rating: f64) -> DriverMeta {
        DriverMeta {
            rating,
            vehicle_type: RideType::Standard,
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = GeoIndex::new();
        let hits = index.query(19.0596, 72.8295, 5.0, 10).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = GeoIndex::new();
        let d1 = Uuid::from_u128(1);
        let d2 = Uuid::from_u128(2);

        // D1 at the query point, D2 ~0.76 km away.
        index.add(d1, 19.0596, 72.8295, 1, meta(4.9)).await;
        index.add(d2, 19.0656, 72.8326, 1, meta(4.6)).await;

        let hits = index.query(19.0596, 72.8295, 5.0, 10).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].driver_id, d1);
        assert_eq!(hits[1].driver_id, d2);
        assert!(hits[0].distance_km < hits[1].distance_km);
    }

    #[tokio::test]
    async fn test_query_ordering_matches_true_distance() {
        let index = GeoIndex::new();
        let origin = Coordinates::new(19.0596, 72.8295);

        // Scatter drivers at varying offsets, then check the returned order
        // is sorted by great-circle distance.
        let offsets = [
            (0.001, 0.002),
            (0.02, -0.01),
            (-0.008, 0.015),
            (0.03, 0.03),
            (-0.001, -0.001),
            (0.012, 0.0),
        ];
        for (i, (dlat, dlng)) in offsets.iter().enumerate() {
            index
                .add(
                    Uuid::from_u128(i as u128 + 1),
                    origin.latitude + dlat,
                    origin.longitude + dlng,
                    1,
                    meta(4.5),
                )
                .await;
        }

        let hits = index
            .query(origin.latitude, origin.longitude, 10.0, 10)
            .await;
        assert_eq!(hits.len(), offsets.len());
        for pair in hits.windows(2) {
            assert!(
                pair[0].distance_km <= pair[1].distance_km,
                "results out of order: {} > {}",
                pair[0].distance_km,
                pair[1].distance_km
            );
        }
    }

    #[tokio::test]
    async fn test_radius_filters() {
        let index = GeoIndex::new();
        let near = Uuid::from_u128(1);
        let far = Uuid::from_u128(2);

        index.add(near, 19.0596, 72.8295, 1, meta(4.9)).await;
        // ~19 km away.
        index.add(far, 19.2300, 72.8600, 1, meta(4.9)).await;

        let hits = index.query(19.0596, 72.8295, 5.0, 10).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].driver_id, near);
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let index = GeoIndex::new();
        for i in 0..20u128 {
            index
                .add(
                    Uuid::from_u128(i + 1),
                    19.0596 + (i as f64) * 0.0001,
                    72.8295,
                    1,
                    meta(4.5),
                )
                .await;
        }
        let hits = index.query(19.0596, 72.8295, 5.0, 10).await;
        assert_eq!(hits.len(), 10);
    }

    #[tokio::test]
    async fn test_update_moves_driver() {
        let index = GeoIndex::new();
        let d1 = Uuid::from_u128(1);

        index.add(d1, 19.0596, 72.8295, 1, meta(4.9)).await;
        index.add(d1, 19.2300, 72.8600, 2, meta(4.9)).await;

        assert_eq!(index.len().await, 1);
        assert_eq!(index.position(d1).await, Some((19.2300, 72.8600)));

        // Old location no longer matches.
        let hits = index.query(19.0596, 72.8295, 2.0, 10).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins_by_timestamp() {
        let index = GeoIndex::new();
        let d1 = Uuid::from_u128(1);

        index.add(d1, 19.10, 72.85, 10, meta(4.9)).await;
        // Stale update loses.
        index.add(d1, 19.90, 72.99, 5, meta(4.9)).await;
        assert_eq!(index.position(d1).await, Some((19.10, 72.85)));

        // Newer update wins.
        index.add(d1, 19.20, 72.86, 11, meta(4.9)).await;
        assert_eq!(index.position(d1).await, Some((19.20, 72.86)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let index = GeoIndex::new();
        let d1 = Uuid::from_u128(1);

        index.add(d1, 19.0596, 72.8295, 1, meta(4.9)).await;
        index.remove(d1).await;
        index.remove(d1).await;

        assert!(index.is_empty().await);
        assert_eq!(index.position(d1).await, None);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_ignored() {
        let index = GeoIndex::new();
        index.add(Uuid::from_u128(1), 95.0, 72.8, 1, meta(4.9)).await;
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_stale() {
        let index = GeoIndex::new();
        index.add(Uuid::from_u128(1), 19.05, 72.82, 1_000, meta(4.9)).await;
        index.add(Uuid::from_u128(2), 19.06, 72.83, 9_000, meta(4.9)).await;

        let evicted = index.evict_stale(10_000, 5_000).await;
        assert_eq!(evicted, 1);
        assert_eq!(index.len().await, 1);
        assert!(index.position(Uuid::from_u128(2)).await.is_some());
    }

    #[tokio::test]
    async fn test_ties_break_by_driver_id() {
        let index = GeoIndex::new();
        let a = Uuid::from_u128(7);
        let b = Uuid::from_u128(3);

        // Identical positions: identical distances.
        index.add(a, 19.0596, 72.8295, 1, meta(4.0)).await;
        index.add(b, 19.0596, 72.8295, 1, meta(5.0)).await;

        let hits = index.query(19.0596, 72.8295, 1.0, 10).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].driver_id, b);
        assert_eq!(hits[1].driver_id, a);
    }
}
