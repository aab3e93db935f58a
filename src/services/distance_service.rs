//! Great-circle distance between the request origin and a recommended place.

use crate::models::request::Coordinates;

/// Mean Earth radius in kilometers (IUGG), the value the `haversine` helpers use.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance in kilometers.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn format_distance(km: f64) -> String {
    format!("{:.2} km", km)
}

/// Human-readable distance label, e.g. `"0.73 km"`.
pub fn distance_info(from: Coordinates, to: Coordinates) -> String {
    format_distance(haversine_km(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_at_zero_offset() {
        let origin = Coordinates::new(22.9973, 120.2125);
        assert_eq!(haversine_km(origin, origin), 0.0);
        assert_eq!(distance_info(origin, origin), "0.00 km");
    }

    #[test]
    fn test_known_pair() {
        let origin = Coordinates::new(22.9973, 120.2125);
        let target = Coordinates::new(22.9908, 120.2133);
        let km = haversine_km(origin, target);
        assert!((km - 0.7274).abs() < 0.01, "got {}", km);
        assert_eq!(distance_info(origin, target), "0.73 km");
    }

    #[test]
    fn test_symmetric() {
        let taipei = Coordinates::new(25.0330, 121.5654);
        let tainan = Coordinates::new(22.9973, 120.2125);
        let there = haversine_km(taipei, tainan);
        let back = haversine_km(tainan, taipei);
        assert!((there - back).abs() < 1e-9);
        assert!((there - 264.80).abs() < 0.05, "got {}", there);
    }
}
