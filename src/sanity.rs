//! Altitude and position sanity checking
//!
//!  Keeps a short rolling history of accepted samples per aircraft and
//!  classifies each new sample against the rate of change it implies.
//!  Every aircraft's history is independent of every other aircraft's.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::greatcircle::{LatLng, knots_between};

/// Outcome of checking a single sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Certainty {
    /// Not enough history to judge; provisionally accepted
    Uncertain,
    /// Consistent with the recent history
    Certain,
    /// Physically impossible; must not be applied
    CertainlyWrong,
}

impl Certainty {
    /// True when the caller may apply the sample
    pub fn is_acceptable(self) -> bool {
        self != Certainty::CertainlyWrong
    }
}

/// Plausibility limits for the sanity checker
#[derive(Debug, Clone)]
pub struct SanityConfig {
    /// Fastest believable climb or descent, feet per second
    pub max_vertical_rate_fps: f64,
    /// Fastest believable ground speed, knots
    pub max_ground_speed_knots: f64,
    /// Accepted samples needed (including the one being checked) before
    /// `Certain`. Values below 2 are treated as 2, so a first sample is
    /// never certain.
    pub min_certain_run: usize,
    /// Accepted samples retained per aircraft
    pub history_len: usize,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            max_vertical_rate_fps: 200.0,
            max_ground_speed_knots: 1500.0,
            min_certain_run: 2,
            history_len: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct Sample<T> {
    time: DateTime<Utc>,
    value: T,
}

/// Rolling evidence for one quantity of one aircraft
#[derive(Debug, Clone)]
struct Track<T> {
    history: VecDeque<Sample<T>>,
    first_good: Option<T>,
}

impl<T: Copy> Track<T> {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            first_good: None,
        }
    }

    /// Classify `value` using `rate_of` against the last accepted sample.
    /// `rate_of(last, candidate, elapsed_secs)` returns the implied rate.
    fn check<F>(
        &mut self,
        time: DateTime<Utc>,
        value: T,
        limit: f64,
        config: &SanityConfig,
        rate_of: F,
    ) -> Certainty
    where
        F: Fn(T, T, f64) -> f64,
    {
        if let Some(last) = self.history.back() {
            let elapsed = (time - last.time).num_milliseconds() as f64 / 1000.0;
            let rate = rate_of(last.value, value, elapsed);
            if rate.is_nan() || rate > limit {
                return Certainty::CertainlyWrong;
            }
        }

        self.history.push_back(Sample { time, value });
        while self.history.len() > config.history_len.max(1) {
            self.history.pop_front();
        }
        if self.first_good.is_none() {
            self.first_good = Some(value);
        }

        if self.history.len() >= config.min_certain_run.max(2) {
            Certainty::Certain
        } else {
            Certainty::Uncertain
        }
    }
}

#[derive(Debug, Clone)]
struct AircraftHistory {
    altitude: Track<i32>,
    position: Track<LatLng>,
}

impl AircraftHistory {
    fn new(capacity: usize) -> Self {
        Self {
            altitude: Track::new(capacity),
            position: Track::new(capacity),
        }
    }
}

/// Per-aircraft altitude and position sanity checker.
///
/// Holds no locks; the owner serializes access.
#[derive(Debug, Default)]
pub struct SanityChecker {
    config: SanityConfig,
    aircraft: HashMap<u32, AircraftHistory>,
}

impl SanityChecker {
    pub fn new(config: SanityConfig) -> Self {
        Self {
            config,
            aircraft: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SanityConfig {
        &self.config
    }

    fn history_mut(&mut self, id: u32) -> (&SanityConfig, &mut AircraftHistory) {
        let Self { config, aircraft } = self;
        let history = aircraft
            .entry(id)
            .or_insert_with(|| AircraftHistory::new(config.history_len));
        (config, history)
    }

    /// Classify an altitude sample in feet
    pub fn check_altitude(&mut self, id: u32, time: DateTime<Utc>, altitude: i32) -> Certainty {
        let (config, history) = self.history_mut(id);
        history.altitude.check(
            time,
            altitude,
            config.max_vertical_rate_fps,
            config,
            vertical_rate,
        )
    }

    /// Classify a position fix
    pub fn check_position(
        &mut self,
        id: u32,
        time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Certainty {
        if latitude == 0.0 && longitude == 0.0 {
            return Certainty::CertainlyWrong;
        }
        let (config, history) = self.history_mut(id);
        history.position.check(
            time,
            LatLng::new(latitude, longitude),
            config.max_ground_speed_knots,
            config,
            knots_between,
        )
    }

    /// First altitude ever accepted for the aircraft
    pub fn first_good_altitude(&self, id: u32) -> Option<i32> {
        self.aircraft.get(&id).and_then(|h| h.altitude.first_good)
    }

    /// First position ever accepted for the aircraft
    pub fn first_good_position(&self, id: u32) -> Option<LatLng> {
        self.aircraft.get(&id).and_then(|h| h.position.first_good)
    }

    /// Forget everything known about one aircraft
    pub fn reset_aircraft(&mut self, id: u32) {
        self.aircraft.remove(&id);
    }

    /// Number of aircraft with history
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

/// Absolute feet per second between two altitudes
fn vertical_rate(from: i32, to: i32, elapsed_secs: f64) -> f64 {
    let delta = (to as f64 - from as f64).abs();
    if delta == 0.0 {
        0.0
    } else if elapsed_secs <= 0.0 {
        f64::INFINITY
    } else {
        delta / elapsed_secs
    }
}
