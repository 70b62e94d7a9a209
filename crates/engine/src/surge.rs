//! Surge zone resolution.
//!
//! A pickup inside an active zone's polygon takes that zone's multiplier.
//! Active zones without geometry act as region-wide fallbacks. No zone means
//! no surge (multiplier 1.0).

use geo::{point, Contains, LineString, Polygon};
use sqlx::PgPool;

use domain::models::SurgeZone;
use persistence::repositories::SurgeZoneRepository;

/// Baseline multiplier when no active zone covers the point.
pub const NO_SURGE: f64 = 1.0;

/// Resolves surge multipliers for pickup points.
#[derive(Clone)]
pub struct SurgeResolver {
    zones: SurgeZoneRepository,
}

impl SurgeResolver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            zones: SurgeZoneRepository::new(pool),
        }
    }

    /// Multiplier applying at the given pickup point.
    pub async fn multiplier_at(&self, latitude: f64, longitude: f64) -> Result<f64, sqlx::Error> {
        let zones: Vec<SurgeZone> = self
            .zones
            .list_active()
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(resolve_multiplier(&zones, latitude, longitude))
    }
}

/// Pure resolution over a set of active zones.
///
/// Zones with geometry are checked by containment first; a zone without
/// geometry is a catch-all default. Zone ordering (creation order) breaks
/// overlaps.
pub fn resolve_multiplier(zones: &[SurgeZone], latitude: f64, longitude: f64) -> f64 {
    let pickup = point! { x: longitude, y: latitude };

    for zone in zones {
        if let Some(ring) = &zone.polygon {
            if ring.len() < 3 {
                continue;
            }
            let polygon = Polygon::new(
                LineString::from(
                    ring.iter()
                        .map(|[lat, lng]| (*lng, *lat))
                        .collect::<Vec<_>>(),
                ),
                vec![],
            );
            if polygon.contains(&pickup) {
                return zone.multiplier;
            }
        }
    }

    zones
        .iter()
        .find(|zone| zone.polygon.is_none())
        .map(|zone| zone.multiplier)
        .unwrap_or(NO_SURGE)
}
