//! Trail coordinate value type

use serde::Serialize;

use crate::greatcircle::LatLng;

/// One point on an aircraft's trail.
///
/// Never mutated once it is on a trail; a point that gets superseded is
/// replaced by a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f32,
    pub longitude: f32,
    /// Track at the time the point was recorded
    pub heading: Option<f32>,
    /// Altitude in feet
    pub altitude: Option<i32>,
    /// Ground speed in knots
    pub ground_speed: Option<f32>,
    /// Data version active when the point was captured
    pub data_version: i64,
    /// Source timestamp in milliseconds since the Unix epoch
    pub tick: i64,
}

impl Coordinate {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude as f64, self.longitude as f64)
    }

    pub fn same_position(&self, latitude: f32, longitude: f32) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }
}
