//! Applying decoded reports to the store
//!
//!  Each report gets a fresh data version, has its altitude and position
//!  sanity checked, and only the values that pass are written before the
//!  trail is updated.

use std::io::BufRead;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::aircraft::AircraftState;
use crate::error::{Result, TrackError};
use crate::sanity::{Certainty, SanityChecker, SanityConfig};
use crate::store::AircraftStateStore;
use crate::trail::TrailConfig;

/// One decoded report for one aircraft
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSample {
    pub id: u32,
    pub icao24: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub altitude: Option<i32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub track: Option<f32>,
    #[serde(default)]
    pub ground_speed: Option<f32>,
    #[serde(default)]
    pub vertical_rate: Option<i32>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub squawk: Option<u16>,
    #[serde(default)]
    pub on_ground: Option<bool>,
    #[serde(default)]
    pub emergency: Option<bool>,
    #[serde(default)]
    pub receiver_id: Option<u32>,
}

/// Read one JSON sample per line, skipping blank lines
pub fn read_samples(reader: impl BufRead) -> Result<Vec<FeedSample>> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample = serde_json::from_str(line).map_err(|source| TrackError::Parse {
            line: index + 1,
            source,
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// What happened to one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOutcome {
    pub data_version: i64,
    pub altitude: Option<Certainty>,
    pub position: Option<Certainty>,
    pub trail_reset: bool,
}

impl SampleOutcome {
    pub fn rejected_anything(&self) -> bool {
        self.altitude == Some(Certainty::CertainlyWrong)
            || self.position == Some(Certainty::CertainlyWrong)
    }
}

/// Running totals for a processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub samples: u64,
    pub rejected_altitudes: u64,
    pub rejected_positions: u64,
    pub trail_resets: u64,
}

/// Feeds samples into the store on behalf of one processing thread
pub struct FeedProcessor {
    store: Arc<AircraftStateStore>,
    checker: SanityChecker,
    trail_config: TrailConfig,
    short_trail_seconds: i64,
    stats: FeedStats,
}

impl FeedProcessor {
    pub fn new(
        store: Arc<AircraftStateStore>,
        sanity_config: SanityConfig,
        trail_config: TrailConfig,
        short_trail_seconds: i64,
    ) -> Self {
        Self {
            store,
            checker: SanityChecker::new(sanity_config),
            trail_config,
            short_trail_seconds,
            stats: FeedStats::default(),
        }
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn checker(&self) -> &SanityChecker {
        &self.checker
    }

    /// Apply one sample
    pub fn process(&mut self, sample: &FeedSample) -> SampleOutcome {
        let shared = self.store.get_or_add(sample.id, &sample.icao24);
        let data_version = self.store.next_data_version();

        let altitude = sample
            .altitude
            .map(|alt| (alt, self.checker.check_altitude(sample.id, sample.time, alt)));
        let position = match (sample.latitude, sample.longitude) {
            (Some(lat), Some(lng)) => Some((
                lat,
                lng,
                self.checker.check_position(sample.id, sample.time, lat, lng),
            )),
            _ => None,
        };

        let mut aircraft = shared.write();
        aircraft.set_data_version(data_version);
        let messages = *aircraft.count_messages_received() + 1;
        aircraft.set_count_messages_received(messages);
        if aircraft.first_seen().is_none() {
            aircraft.set_first_seen(Some(sample.time));
        }

        if let Some((alt, certainty)) = altitude {
            if certainty.is_acceptable() {
                if *aircraft.altitude() != Some(alt) {
                    aircraft.set_altitude(Some(alt));
                }
            } else {
                self.stats.rejected_altitudes += 1;
                debug!("{}: rejected altitude {} ft", sample.icao24, alt);
            }
        }
        if let Some((lat, lng, certainty)) = position {
            if certainty.is_acceptable() {
                if *aircraft.latitude() != Some(lat) {
                    aircraft.set_latitude(Some(lat));
                }
                if *aircraft.longitude() != Some(lng) {
                    aircraft.set_longitude(Some(lng));
                }
            } else {
                self.stats.rejected_positions += 1;
                debug!("{}: rejected position {:.5},{:.5}", sample.icao24, lat, lng);
            }
        }
        apply_scalars(&mut aircraft, sample);

        let trail =
            aircraft.update_coordinates(sample.time, self.short_trail_seconds, &self.trail_config);
        if trail.reset {
            self.stats.trail_resets += 1;
            debug!("{}: trail reset", sample.icao24);
        }
        self.stats.samples += 1;

        SampleOutcome {
            data_version,
            altitude: altitude.map(|(_, c)| c),
            position: position.map(|(_, _, c)| c),
            trail_reset: trail.reset,
        }
    }

    /// Drop an aircraft from the store along with its sanity history
    pub fn forget(&mut self, unique_id: u32) -> bool {
        self.checker.reset_aircraft(unique_id);
        self.store.remove(unique_id).is_some()
    }
}

/// Write the fields that need no sanity check, only when their value differs
fn apply_scalars(aircraft: &mut AircraftState, sample: &FeedSample) {
    if let Some(track) = sample.track {
        if *aircraft.track() != Some(track) {
            aircraft.set_track(Some(track));
        }
    }
    if let Some(speed) = sample.ground_speed {
        if *aircraft.ground_speed() != Some(speed) {
            aircraft.set_ground_speed(Some(speed));
        }
    }
    if let Some(rate) = sample.vertical_rate {
        if *aircraft.vertical_rate() != Some(rate) {
            aircraft.set_vertical_rate(Some(rate));
        }
    }
    if let Some(ref callsign) = sample.callsign {
        let callsign = callsign.trim();
        if !callsign.is_empty() && aircraft.callsign().as_deref() != Some(callsign) {
            aircraft.set_callsign(Some(callsign.to_string()));
        }
    }
    if let Some(squawk) = sample.squawk {
        if *aircraft.squawk() != Some(squawk) {
            aircraft.set_squawk(Some(squawk));
            aircraft.set_emergency(Some(matches!(squawk, 7500 | 7600 | 7700)));
        }
    }
    if let Some(emergency) = sample.emergency {
        if *aircraft.emergency() != Some(emergency) {
            aircraft.set_emergency(Some(emergency));
        }
    }
    if let Some(on_ground) = sample.on_ground {
        if *aircraft.on_ground() != Some(on_ground) {
            aircraft.set_on_ground(Some(on_ground));
        }
    }
    if let Some(receiver_id) = sample.receiver_id {
        if *aircraft.receiver_id() != receiver_id {
            aircraft.set_receiver_id(receiver_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn processor() -> (Arc<AircraftStateStore>, FeedProcessor) {
        let store = Arc::new(AircraftStateStore::new());
        let processor = FeedProcessor::new(
            Arc::clone(&store),
            SanityConfig::default(),
            TrailConfig::default(),
            30,
        );
        (store, processor)
    }

    fn sample(secs: i64, altitude: i32, lat: f64, lng: f64) -> FeedSample {
        FeedSample {
            id: 1,
            icao24: "4840D6".to_string(),
            time: t0() + Duration::seconds(secs),
            altitude: Some(altitude),
            latitude: Some(lat),
            longitude: Some(lng),
            ..FeedSample::default()
        }
    }

    #[test]
    fn test_process_registers_and_writes() {
        let (store, mut processor) = processor();
        let outcome = processor.process(&sample(0, 10_000, 51.0, -1.0));
        assert_eq!(outcome.data_version, 1);
        assert_eq!(outcome.altitude, Some(Certainty::Uncertain));

        let aircraft = store.find_clone(1).unwrap();
        assert_eq!(*aircraft.altitude(), Some(10_000));
        assert_eq!(aircraft.altitude_changed(), 1);
        assert_eq!(*aircraft.count_messages_received(), 1);
        assert_eq!(aircraft.full_coordinates().len(), 1);
        assert_eq!(*aircraft.first_seen(), Some(t0()));
    }

    #[test]
    fn test_rejected_values_are_not_applied() {
        let (store, mut processor) = processor();
        processor.process(&sample(0, 10_000, 51.0, -1.0));
        processor.process(&sample(1, 10_050, 51.001, -1.0));
        let outcome = processor.process(&sample(2, 40_000, 0.0, 0.0));
        assert!(outcome.rejected_anything());

        let aircraft = store.find_clone(1).unwrap();
        assert_eq!(*aircraft.altitude(), Some(10_050));
        assert_eq!(*aircraft.latitude(), Some(51.001));
        assert_eq!(aircraft.altitude_changed(), 2);
        assert_eq!(*aircraft.count_messages_received(), 3);

        let stats = processor.stats();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.rejected_altitudes, 1);
        assert_eq!(stats.rejected_positions, 1);
    }

    #[test]
    fn test_unchanged_values_keep_their_stamp() {
        let (store, mut processor) = processor();
        let mut s = sample(0, 10_000, 51.0, -1.0);
        s.callsign = Some("BAW1  ".to_string());
        processor.process(&s);
        s.time = t0() + Duration::seconds(5);
        processor.process(&s);

        let aircraft = store.find_clone(1).unwrap();
        assert_eq!(aircraft.callsign().as_deref(), Some("BAW1"));
        assert_eq!(aircraft.callsign_changed(), 1);
        assert_eq!(aircraft.count_messages_received_changed(), 2);
        assert_eq!(aircraft.data_version(), 2);
    }

    #[test]
    fn test_emergency_squawk() {
        let (store, mut processor) = processor();
        let mut s = sample(0, 10_000, 51.0, -1.0);
        s.squawk = Some(7700);
        processor.process(&s);
        assert_eq!(*store.find_clone(1).unwrap().emergency(), Some(true));
    }

    #[test]
    fn test_forget_resets_history() {
        let (store, mut processor) = processor();
        processor.process(&sample(0, 10_000, 51.0, -1.0));
        assert!(processor.forget(1));
        assert!(store.is_empty());
        assert_eq!(processor.checker().first_good_altitude(1), None);
        assert!(!processor.forget(1));

        let outcome = processor.process(&sample(1, 30_000, 52.0, 1.0));
        assert_eq!(outcome.altitude, Some(Certainty::Uncertain));
    }

    #[test]
    fn test_read_samples() {
        let input = concat!(
            r#"{"id":1,"icao24":"4840D6","time":"2024-06-01T12:00:00Z","altitude":1000}"#,
            "\n\n",
            r#"{"id":2,"icao24":"406A3B","time":"2024-06-01T12:00:01Z","latitude":51.5,"longitude":-0.1}"#,
            "\n"
        );
        let samples = read_samples(input.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].altitude, Some(1000));
        assert_eq!(samples[1].latitude, Some(51.5));
        assert_eq!(samples[1].time, t0() + Duration::seconds(1));
    }

    #[test]
    fn test_read_samples_reports_line() {
        let input = "\n{\"id\":1}\n";
        match read_samples(input.as_bytes()) {
            Err(TrackError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
