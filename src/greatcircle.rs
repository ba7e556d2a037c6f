//! Great-circle maths on a spherical earth
//!
//!  Distances use the haversine formula, bearings the initial great-circle course.

use serde::Serialize;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres in one nautical mile
pub const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Distance in kilometres between two lat/lon points
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Initial bearing in degrees (0..360) travelling from the first point to the second
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Point reached after travelling `distance` km from `start` on an initial `bearing`
pub fn destination(start: LatLng, bearing: f64, distance: f64) -> LatLng {
    let lat1 = start.latitude.to_radians();
    let lon1 = start.longitude.to_radians();
    let brg = bearing.to_radians();
    let angular = distance / EARTH_RADIUS_KM;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * brg.cos()).asin();
    let lon2 = lon1
        + (brg.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    let mut longitude = lon2.to_degrees();
    if longitude > 180.0 {
        longitude -= 360.0;
    } else if longitude < -180.0 {
        longitude += 360.0;
    }
    LatLng::new(lat2.to_degrees(), longitude)
}

/// Smallest absolute difference between two headings, 0..=180
pub fn heading_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Implied speed in knots for covering the distance between two points in `elapsed_secs`.
///
/// A zero or negative elapsed time with any movement is an infinite speed.
pub fn knots_between(from: LatLng, to: LatLng, elapsed_secs: f64) -> f64 {
    let km = distance_km(from.latitude, from.longitude, to.latitude, to.longitude);
    if km == 0.0 {
        return 0.0;
    }
    if elapsed_secs <= 0.0 {
        return f64::INFINITY;
    }
    (km / KM_PER_NAUTICAL_MILE) / (elapsed_secs / 3600.0)
}
