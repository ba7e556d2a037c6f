//! Store of tracked aircraft
//!
//!  Structural changes and snapshots are serialized by one coarse lock.
//!  Each aircraft sits behind its own lock, held by its feed thread while a
//!  message's fields are written and by `take_snapshot` while it is cloned.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::aircraft::AircraftState;
use crate::error::{Result, TrackError};

/// An aircraft shared between its feed thread and the store
pub type SharedAircraft = Arc<RwLock<AircraftState>>;

/// Independent copies of every aircraft at one instant
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Clones ordered by unique id
    pub aircraft: Vec<AircraftState>,
    /// Milliseconds since the Unix epoch at which the snapshot was taken
    pub snapshot_time_ticks: i64,
    /// Highest data version across the snapshot, zero when empty
    pub max_data_version: i64,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    pub fn find(&self, unique_id: u32) -> Option<&AircraftState> {
        self.aircraft
            .binary_search_by_key(&unique_id, |a| a.unique_id())
            .ok()
            .map(|i| &self.aircraft[i])
    }
}

/// Thread-safe store of aircraft keyed by unique id
#[derive(Debug, Default)]
pub struct AircraftStateStore {
    aircraft: Mutex<HashMap<u32, SharedAircraft>>,
    last_data_version: AtomicI64,
}

impl AircraftStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new aircraft
    pub fn add(&self, aircraft: AircraftState) -> Result<SharedAircraft> {
        let id = aircraft.unique_id();
        let mut map = self.aircraft.lock();
        if map.contains_key(&id) {
            return Err(TrackError::DuplicateAircraft(id));
        }
        let shared = Arc::new(RwLock::new(aircraft));
        map.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    /// Find the aircraft with `unique_id`, registering it when unseen
    pub fn get_or_add(&self, unique_id: u32, icao24: &str) -> SharedAircraft {
        let mut map = self.aircraft.lock();
        Arc::clone(
            map.entry(unique_id)
                .or_insert_with(|| Arc::new(RwLock::new(AircraftState::new(unique_id, icao24)))),
        )
    }

    pub fn find(&self, unique_id: u32) -> Option<SharedAircraft> {
        self.aircraft.lock().get(&unique_id).cloned()
    }

    /// Clone of one aircraft
    pub fn find_clone(&self, unique_id: u32) -> Option<AircraftState> {
        let shared = self.find(unique_id)?;
        let aircraft = shared.read().clone();
        Some(aircraft)
    }

    pub fn remove(&self, unique_id: u32) -> Option<SharedAircraft> {
        self.aircraft.lock().remove(&unique_id)
    }

    /// Run `f` with exclusive access to a registered aircraft
    pub fn with_aircraft_mut<R>(
        &self,
        unique_id: u32,
        f: impl FnOnce(&mut AircraftState) -> R,
    ) -> Result<R> {
        let shared = self
            .find(unique_id)
            .ok_or(TrackError::UnknownAircraft(unique_id))?;
        let mut aircraft = shared.write();
        Ok(f(&mut aircraft))
    }

    /// Ids of all registered aircraft, ascending
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.aircraft.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.aircraft.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.lock().is_empty()
    }

    /// Next value of the store-wide data version sequence
    pub fn next_data_version(&self) -> i64 {
        self.last_data_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Clone every aircraft under the structural lock
    pub fn take_snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        let map = self.aircraft.lock();
        let mut aircraft: Vec<AircraftState> = map.values().map(|a| a.read().clone()).collect();
        drop(map);

        aircraft.sort_unstable_by_key(|a| a.unique_id());
        let max_data_version = aircraft
            .iter()
            .map(|a| a.data_version())
            .max()
            .unwrap_or_default();

        Snapshot {
            aircraft,
            snapshot_time_ticks: now.timestamp_millis(),
            max_data_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::thread;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_aircraft_store() {
        let store = AircraftStateStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.find(1).is_none());
    }

    #[test]
    fn test_add_find_remove() {
        let store = AircraftStateStore::new();
        store.add(AircraftState::new(1, "4840D6")).unwrap();
        store.add(AircraftState::new(2, "406A3B")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.ids(), vec![1, 2]);

        let found = store.find(2).unwrap();
        assert_eq!(found.read().icao24(), "406A3B");

        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        assert!(store.find(1).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let store = AircraftStateStore::new();
        store.add(AircraftState::new(1, "4840D6")).unwrap();
        let err = store.add(AircraftState::new(1, "4840D6")).unwrap_err();
        assert!(matches!(err, TrackError::DuplicateAircraft(1)));
    }

    #[test]
    fn test_get_or_add_returns_same_entity() {
        let store = AircraftStateStore::new();
        let a = store.get_or_add(5, "ABCDEF");
        let b = store.get_or_add(5, "ABCDEF");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_with_aircraft_mut() {
        let store = AircraftStateStore::new();
        store.add(AircraftState::new(1, "4840D6")).unwrap();
        store
            .with_aircraft_mut(1, |a| {
                a.set_data_version(3);
                a.set_callsign(Some("KLM1".to_string()));
            })
            .unwrap();
        assert_eq!(store.find_clone(1).unwrap().callsign_changed(), 3);

        let err = store.with_aircraft_mut(9, |_| ()).unwrap_err();
        assert!(matches!(err, TrackError::UnknownAircraft(9)));
    }

    #[test]
    fn test_snapshot_watermark() {
        let store = AircraftStateStore::new();
        let mut a = AircraftState::new(2, "000002");
        a.set_data_version(101);
        let mut b = AircraftState::new(1, "000001");
        b.set_data_version(100);
        store.add(a).unwrap();
        store.add(b).unwrap();

        let snapshot = store.take_snapshot(now());
        assert_eq!(snapshot.max_data_version, 101);
        assert_eq!(snapshot.snapshot_time_ticks, now().timestamp_millis());
        let ids: Vec<_> = snapshot.aircraft.iter().map(|a| a.unique_id()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(snapshot.find(2).unwrap().data_version(), 101);
        assert!(snapshot.find(3).is_none());
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = AircraftStateStore::new().take_snapshot(now());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.max_data_version, 0);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_writes() {
        let store = AircraftStateStore::new();
        let shared = store.add(AircraftState::new(1, "000001")).unwrap();
        let snapshot = store.take_snapshot(now());

        {
            let mut aircraft = shared.write();
            aircraft.set_data_version(50);
            aircraft.set_altitude(Some(9000));
        }
        assert!(snapshot.aircraft[0].altitude().is_none());
        assert_eq!(store.take_snapshot(now()).max_data_version, 50);
    }

    #[test]
    fn test_next_data_version_is_monotonic() {
        let store = Arc::new(AircraftStateStore::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || (0..100).map(|_| store.next_data_version()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(all[0], 1);
        assert_eq!(all[399], 400);
    }

    #[test]
    fn test_concurrent_writers_and_snapshots() {
        let store = Arc::new(AircraftStateStore::new());
        let writers: Vec<_> = (1..=4u32)
            .map(|id| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let shared = store.get_or_add(id, &format!("{:06X}", id));
                    for _ in 0..200 {
                        let version = store.next_data_version();
                        let mut aircraft = shared.write();
                        aircraft.set_data_version(version);
                        aircraft.set_altitude(Some(version as i32));
                        aircraft.set_squawk(Some(1200));
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.take_snapshot(now());
                    for aircraft in &snapshot.aircraft {
                        // Both writes of one batch carry the same stamp
                        if aircraft.altitude_changed() != 0 {
                            assert_eq!(aircraft.altitude_changed(), aircraft.squawk_changed());
                        }
                    }
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(store.take_snapshot(now()).max_data_version, 800);
    }
}
