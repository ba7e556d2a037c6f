//! Differential sync payloads
//!
//!  A client remembers the `max_data_version` of the last payload it
//!  received and asks for everything newer. Aircraft untouched since then
//!  are left out; the rest carry only their changed fields and new trail
//!  points. Points that age out of the short-trail window are not reported,
//!  so clients trim their own copy to the same window.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aircraft::AircraftState;
use crate::coordinate::Coordinate;
use crate::store::Snapshot;

/// Changes to one aircraft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftDelta {
    pub unique_id: u32,
    pub fields: Map<String, Value>,
    /// The client must drop its copy of the trail before appending `trail`
    pub reset_trail: bool,
    pub trail: Vec<Coordinate>,
}

impl AircraftDelta {
    pub fn since(aircraft: &AircraftState, since: i64) -> Self {
        let reset_trail = aircraft.first_coordinate_changed() > since
            || aircraft.trail_reset_changed() > since;
        let trail = aircraft
            .short_coordinates()
            .iter()
            .filter(|c| reset_trail || c.data_version > since)
            .copied()
            .collect();

        Self {
            unique_id: aircraft.unique_id(),
            fields: aircraft.changed_fields_since(since),
            reset_trail,
            trail,
        }
    }
}

/// Everything a client holding `since` needs to catch up with a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPayload {
    pub since: i64,
    pub max_data_version: i64,
    pub snapshot_time_ticks: i64,
    pub aircraft: Vec<AircraftDelta>,
    /// Every id in the snapshot, so clients can drop aircraft that vanished
    pub ids: Vec<u32>,
}

impl SyncPayload {
    pub fn build(snapshot: &Snapshot, since: i64) -> Self {
        let aircraft = snapshot
            .aircraft
            .iter()
            .filter(|a| a.has_changed_since(since))
            .map(|a| AircraftDelta::since(a, since))
            .collect();

        Self {
            since,
            max_data_version: snapshot.max_data_version,
            snapshot_time_ticks: snapshot.snapshot_time_ticks,
            aircraft,
            ids: snapshot.aircraft.iter().map(|a| a.unique_id()).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AircraftStateStore;
    use crate::trail::TrailConfig;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn store_with_two_aircraft() -> AircraftStateStore {
        let store = AircraftStateStore::new();
        let first = store.get_or_add(1, "000001");
        let second = store.get_or_add(2, "000002");
        {
            let mut a = first.write();
            a.set_data_version(10);
            a.set_callsign(Some("ONE".to_string()));
            a.set_latitude(Some(51.0));
            a.set_longitude(Some(-1.0));
            a.update_coordinates(t0(), 30, &TrailConfig::default());
        }
        {
            let mut b = second.write();
            b.set_data_version(11);
            b.set_callsign(Some("TWO".to_string()));
        }
        store
    }

    #[test]
    fn test_full_payload_from_zero() {
        let store = store_with_two_aircraft();
        let payload = SyncPayload::build(&store.take_snapshot(t0()), 0);
        assert_eq!(payload.max_data_version, 11);
        assert_eq!(payload.ids, vec![1, 2]);
        assert_eq!(payload.aircraft.len(), 2);
        let first = &payload.aircraft[0];
        assert!(first.reset_trail);
        assert_eq!(first.trail.len(), 1);
        assert_eq!(first.fields["callsign"], serde_json::json!("ONE"));
    }

    #[test]
    fn test_incremental_payload() {
        let store = store_with_two_aircraft();
        let watermark = store.take_snapshot(t0()).max_data_version;

        store
            .with_aircraft_mut(1, |a| {
                a.set_data_version(12);
                a.set_latitude(Some(51.01));
                a.update_coordinates(t0() + Duration::seconds(10), 30, &TrailConfig::default());
            })
            .unwrap();

        let payload = SyncPayload::build(&store.take_snapshot(t0()), watermark);
        assert_eq!(payload.aircraft.len(), 1);
        let delta = &payload.aircraft[0];
        assert_eq!(delta.unique_id, 1);
        assert!(!delta.reset_trail);
        assert_eq!(delta.trail.len(), 1);
        assert_eq!(delta.trail[0].data_version, 12);
        assert!(delta.fields.contains_key("latitude"));
        assert!(delta.fields.contains_key("position_time"));
        assert!(!delta.fields.contains_key("callsign"));
    }

    #[test]
    fn test_reset_coordinates_is_reported() {
        let store = store_with_two_aircraft();
        let watermark = store.take_snapshot(t0()).max_data_version;

        store
            .with_aircraft_mut(1, |a| {
                a.set_data_version(12);
                a.reset_coordinates();
            })
            .unwrap();

        let payload = SyncPayload::build(&store.take_snapshot(t0()), watermark);
        assert_eq!(payload.aircraft.len(), 1);
        let delta = &payload.aircraft[0];
        assert_eq!(delta.unique_id, 1);
        assert!(delta.reset_trail);
        assert!(delta.trail.is_empty());
        assert!(delta.fields.is_empty());
    }

    #[test]
    fn test_nothing_changed() {
        let store = store_with_two_aircraft();
        let payload = SyncPayload::build(&store.take_snapshot(t0()), 11);
        assert!(payload.aircraft.is_empty());
        assert_eq!(payload.ids.len(), 2);
        assert!(payload.to_json().unwrap().contains("\"aircraft\":[]"));
    }
}
