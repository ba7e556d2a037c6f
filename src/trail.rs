//! Dual-resolution position trail
//!
//!  The full trail keeps the whole history, collapsing straight-line runs
//!  into their latest point. The short trail applies the same rule but only
//!  keeps the last few seconds. Both are discarded when two consecutive fixes
//!  imply an impossible ground speed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coordinate::Coordinate;
use crate::greatcircle::{bearing_deg, heading_difference, knots_between};

/// Minimum spacing between trail points, milliseconds
const MIN_POINT_SPACING_MS: i64 = 1000;

/// Tuning for trail maintenance
#[derive(Debug, Clone)]
pub struct TrailConfig {
    /// Largest change in implied heading that still counts as a straight line
    pub heading_tolerance_deg: f64,
    /// Fixes implying a faster ground speed than this reset the trail
    pub max_ground_speed_knots: f64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            heading_tolerance_deg: 1.0,
            max_ground_speed_knots: 1500.0,
        }
    }
}

/// The current telemetry values of an aircraft, as fed to the trail
#[derive(Debug, Clone, Copy)]
pub struct TrailSample {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub track: Option<f32>,
    pub altitude: Option<i32>,
    pub ground_speed: Option<f32>,
    pub data_version: i64,
    pub time: DateTime<Utc>,
}

/// What an update did to the trail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrailUpdate {
    /// Latitude or longitude differed from the last recorded point
    pub position_changed: bool,
    /// Both trails were discarded by the teleport guard
    pub reset: bool,
    /// A point was appended or replaced
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateTrail {
    full: Vec<Coordinate>,
    short: Vec<Coordinate>,
    first_changed: i64,
    last_changed: i64,
    latest_time: DateTime<Utc>,
}

impl Default for CoordinateTrail {
    fn default() -> Self {
        Self {
            full: Vec::new(),
            short: Vec::new(),
            first_changed: 0,
            last_changed: 0,
            latest_time: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl CoordinateTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full(&self) -> &[Coordinate] {
        &self.full
    }

    pub fn short(&self) -> &[Coordinate] {
        &self.short
    }

    /// Data version at which the trail last went from empty to non-empty
    pub fn first_changed(&self) -> i64 {
        self.first_changed
    }

    /// Data version of the last append or replace
    pub fn last_changed(&self) -> i64 {
        self.last_changed
    }

    /// Time of the latest sample seen, `DateTime::MIN_UTC` when none
    pub fn latest_time(&self) -> DateTime<Utc> {
        self.latest_time
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Discard both trails and their stamps
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold the aircraft's current values into the trail
    pub fn update(
        &mut self,
        sample: &TrailSample,
        short_trail_seconds: i64,
        config: &TrailConfig,
    ) -> TrailUpdate {
        let mut outcome = TrailUpdate::default();
        let tick = sample.time.timestamp_millis();

        let (latitude, longitude) = match (sample.latitude, sample.longitude) {
            (Some(lat), Some(lng)) => (lat as f32, lng as f32),
            _ => return outcome,
        };
        let last = self.full.last().copied();

        let candidate = match last {
            None => Coordinate {
                latitude,
                longitude,
                heading: sample.track,
                altitude: sample.altitude,
                ground_speed: sample.ground_speed,
                data_version: sample.data_version,
                tick,
            },
            Some(last) if !last.same_position(latitude, longitude) => {
                outcome.position_changed = true;
                Coordinate {
                    latitude,
                    longitude,
                    heading: sample.track,
                    altitude: sample.altitude,
                    ground_speed: sample.ground_speed,
                    data_version: sample.data_version,
                    tick,
                }
            }
            Some(last)
                if last.altitude != sample.altitude || last.ground_speed != sample.ground_speed =>
            {
                // Stationary in plan but climbing, descending or changing speed
                Coordinate {
                    heading: sample.track,
                    altitude: sample.altitude,
                    ground_speed: sample.ground_speed,
                    data_version: sample.data_version,
                    tick,
                    ..last
                }
            }
            Some(_) => return outcome,
        };
        if last.is_none() {
            outcome.position_changed = true;
        }

        if let Some(last) = last {
            let elapsed_ms = tick - last.tick;
            if outcome.position_changed {
                let knots = knots_between(
                    last.position(),
                    candidate.position(),
                    elapsed_ms.max(0) as f64 / 1000.0,
                );
                if knots > config.max_ground_speed_knots {
                    self.full.clear();
                    self.short.clear();
                    outcome.reset = true;
                    self.record(candidate, sample, short_trail_seconds, config);
                    outcome.recorded = true;
                    return outcome;
                }
            }

            if elapsed_ms < MIN_POINT_SPACING_MS {
                self.latest_time = sample.time;
                return outcome;
            }
        }

        self.record(candidate, sample, short_trail_seconds, config);
        outcome.recorded = true;
        outcome
    }

    fn record(
        &mut self,
        candidate: Coordinate,
        sample: &TrailSample,
        short_trail_seconds: i64,
        config: &TrailConfig,
    ) {
        if self.full.is_empty() {
            self.first_changed = sample.data_version;
        }

        append_or_replace(&mut self.full, candidate, config.heading_tolerance_deg);
        append_or_replace(&mut self.short, candidate, config.heading_tolerance_deg);

        let window_ms = short_trail_seconds.max(0).saturating_mul(1000);
        let threshold = candidate.tick.saturating_sub(window_ms);
        self.short.retain(|c| c.tick >= threshold);

        self.last_changed = sample.data_version;
        self.latest_time = sample.time;
    }
}

/// Replace the last point when the candidate continues the last segment's
/// heading, otherwise append it
fn append_or_replace(trail: &mut Vec<Coordinate>, candidate: Coordinate, tolerance: f64) {
    if let [.., before, last] = trail.as_slice() {
        let moved = !candidate.same_position(last.latitude, last.longitude);
        let segment_moved = !last.same_position(before.latitude, before.longitude);
        if moved && segment_moved {
            let segment = bearing(before, last);
            let continuing = bearing(last, &candidate);
            if heading_difference(segment, continuing) <= tolerance {
                let end = trail.len() - 1;
                trail[end] = candidate;
                return;
            }
        }
    }
    trail.push(candidate);
}

fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    bearing_deg(
        from.latitude as f64,
        from.longitude as f64,
        to.latitude as f64,
        to.longitude as f64,
    )
}
