//! In-memory driver and rider activity registry.
//!
//! The hot ingest path cannot afford a database read per ping, so the engine
//! mirrors each driver's status, match-relevant attributes, and active ride
//! here. Authoritative state stays in the database; this shadow is refreshed
//! on every availability change and ride transition.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::geo_index::DriverMeta;
use domain::models::DriverStatus;

/// What the engine currently knows about a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverActivity {
    pub status: DriverStatus,
    pub meta: DriverMeta,
    pub active_ride: Option<Uuid>,
}

/// Registry of live driver activity and rider active rides.
pub struct PresenceRegistry {
    drivers: RwLock<HashMap<Uuid, DriverActivity>>,
    riders: RwLock<HashMap<Uuid, Uuid>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
            riders: RwLock::new(HashMap::new()),
        }
    }

    /// Current activity for a driver.
    pub async fn driver_activity(&self, driver_id: Uuid) -> Option<DriverActivity> {
        self.drivers.read().await.get(&driver_id).copied()
    }

    /// Record a driver's availability status and attributes.
    pub async fn set_driver_status(&self, driver_id: Uuid, status: DriverStatus, meta: DriverMeta) {
        let mut drivers = self.drivers.write().await;
        let entry = drivers.entry(driver_id).or_insert(DriverActivity {
            status,
            meta,
            active_ride: None,
        });
        entry.status = status;
        entry.meta = meta;
        if !matches!(status, DriverStatus::OnRide) {
            entry.active_ride = None;
        }
    }

    /// Bind a driver to an active ride (matched).
    pub async fn set_driver_on_ride(&self, driver_id: Uuid, ride_id: Uuid) {
        let mut drivers = self.drivers.write().await;
        if let Some(entry) = drivers.get_mut(&driver_id) {
            entry.status = DriverStatus::OnRide;
            entry.active_ride = Some(ride_id);
        } else {
            drivers.insert(
                driver_id,
                DriverActivity {
                    status: DriverStatus::OnRide,
                    meta: DriverMeta {
                        rating: 5.0,
                        vehicle_type: domain::models::RideType::Standard,
                    },
                    active_ride: Some(ride_id),
                },
            );
        }
    }

    /// Release a driver from their ride, back to AVAILABLE.
    pub async fn release_driver(&self, driver_id: Uuid) {
        let mut drivers = self.drivers.write().await;
        if let Some(entry) = drivers.get_mut(&driver_id) {
            entry.status = DriverStatus::Available;
            entry.active_ride = None;
        }
    }

    /// Forget a driver entirely (went offline).
    pub async fn forget_driver(&self, driver_id: Uuid) {
        self.drivers.write().await.remove(&driver_id);
    }

    /// The ride a rider currently has in flight, if any.
    pub async fn rider_active_ride(&self, rider_id: Uuid) -> Option<Uuid> {
        self.riders.read().await.get(&rider_id).copied()
    }

    /// Track a rider's in-flight ride.
    pub async fn set_rider_active(&self, rider_id: Uuid, ride_id: Uuid) {
        self.riders.write().await.insert(rider_id, ride_id);
    }

    /// Clear a rider's in-flight ride once it reaches a terminal status.
    pub async fn clear_rider_active(&self, rider_id: Uuid) {
        self.riders.write().await.remove(&rider_id);
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::RideType;

    fn meta() -> DriverMeta {
        DriverMeta {
            rating: 4.9,
            vehicle_type: RideType::Standard,
        }
    }

    #[tokio::test]
    async fn test_status_roundtrip() {
        let presence = PresenceRegistry::new();
        let driver = Uuid::new_v4();

        assert!(presence.driver_activity(driver).await.is_none());

        presence
            .set_driver_status(driver, DriverStatus::Available, meta())
            .await;
        let activity = presence.driver_activity(driver).await.unwrap();
        assert_eq!(activity.status, DriverStatus::Available);
        assert!(activity.active_ride.is_none());
    }

    #[tokio::test]
    async fn test_on_ride_and_release() {
        let presence = PresenceRegistry::new();
        let driver = Uuid::new_v4();
        let ride = Uuid::new_v4();

        presence
            .set_driver_status(driver, DriverStatus::Available, meta())
            .await;
        presence.set_driver_on_ride(driver, ride).await;

        let activity = presence.driver_activity(driver).await.unwrap();
        assert_eq!(activity.status, DriverStatus::OnRide);
        assert_eq!(activity.active_ride, Some(ride));

        presence.release_driver(driver).await;
        let activity = presence.driver_activity(driver).await.unwrap();
        assert_eq!(activity.status, DriverStatus::Available);
        assert!(activity.active_ride.is_none());
    }

    #[tokio::test]
    async fn test_going_offline_clears_active_ride() {
        let presence = PresenceRegistry::new();
        let driver = Uuid::new_v4();

        presence.set_driver_on_ride(driver, Uuid::new_v4()).await;
        presence
            .set_driver_status(driver, DriverStatus::Offline, meta())
            .await;

        let activity = presence.driver_activity(driver).await.unwrap();
        assert_eq!(activity.status, DriverStatus::Offline);
        assert!(activity.active_ride.is_none());
    }

    #[tokio::test]
    async fn test_rider_tracking() {
        let presence = PresenceRegistry::new();
        let rider = Uuid::new_v4();
        let ride = Uuid::new_v4();

        assert!(presence.rider_active_ride(rider).await.is_none());
        presence.set_rider_active(rider, ride).await;
        assert_eq!(presence.rider_active_ride(rider).await, Some(ride));
        presence.clear_rider_active(rider).await;
        assert!(presence.rider_active_ride(rider).await.is_none());
    }
}
