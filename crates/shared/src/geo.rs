//! Geographic math helpers.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in kilometres (Haversine).
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = Coordinates::new(19.0596, 72.8295);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Gateway of India to CST station, roughly 2.4 km apart.
        let gateway = Coordinates::new(18.9220, 72.8347);
        let cst = Coordinates::new(18.9398, 72.8355);
        let d = haversine_km(gateway, cst);
        assert!(d > 1.5 && d < 2.5, "unexpected distance: {}", d);
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = Coordinates::new(19.0596, 72.8295);
        let b = Coordinates::new(19.0760, 72.8777);
        let ab = haversine_km(a, b);
        let ba = haversine_km(b, a);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_antimeridian() {
        let a = Coordinates::new(0.0, 179.9);
        let b = Coordinates::new(0.0, -179.9);
        let d = haversine_km(a, b);
        // 0.2 degrees of longitude at the equator is about 22 km.
        assert!(d < 30.0, "distance across the antimeridian: {}", d);
    }
}
