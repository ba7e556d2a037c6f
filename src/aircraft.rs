//! Versioned aircraft state
//!
//!  Every telemetry field carries the data version at which it was last
//!  written, so that clients can be sent only what changed since the version
//!  they last saw. The caller sets the data version before writing a batch
//!  of fields; each setter stamps its own field and nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coordinate::Coordinate;
use crate::trail::{CoordinateTrail, TrailConfig, TrailSample, TrailUpdate};

/// How an altitude or vertical rate was measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AltitudeType {
    #[default]
    Barometric,
    Geometric,
}

/// What kind of speed the ground speed field holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedType {
    #[default]
    GroundSpeed,
    GroundSpeedReversing,
    IndicatedAirSpeed,
    TrueAirSpeed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransponderType {
    #[default]
    Unknown,
    ModeS,
    Adsb,
    Adsb0,
    Adsb1,
    Adsb2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeTurbulenceCategory {
    #[default]
    None,
    Light,
    Medium,
    Heavy,
    Jumbo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineType {
    #[default]
    None,
    Piston,
    Turbo,
    Jet,
    Electric,
    Rocket,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePlacement {
    #[default]
    Unknown,
    AftMounted,
    WingBuried,
    FuselageBuried,
    NoseMounted,
    WingMounted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Species {
    #[default]
    None,
    LandPlane,
    SeaPlane,
    Amphibian,
    Helicopter,
    Gyrocopter,
    Tiltwing,
    GroundVehicle,
    Tower,
}

/// A value and the data version it was last written at
#[derive(Debug, Clone, Default, PartialEq)]
struct Versioned<T> {
    value: T,
    changed: i64,
}

impl<T> Versioned<T> {
    fn set(&mut self, value: T, version: i64) {
        self.value = value;
        self.changed = version;
    }
}

/// Declares the versioned fields along with a getter, a stamping setter and
/// a changed-stamp getter for each one.
macro_rules! versioned_fields {
    ($(
        $(#[$doc:meta])*
        $field:ident, $setter:ident, $changed:ident: $ty:ty;
    )*) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Fields {
            $( $field: Versioned<$ty>, )*
        }

        impl AircraftState {
            $(
                $(#[$doc])*
                pub fn $field(&self) -> &$ty {
                    &self.fields.$field.value
                }

                pub fn $setter(&mut self, value: $ty) {
                    self.fields.$field.set(value, self.data_version);
                }

                pub fn $changed(&self) -> i64 {
                    self.fields.$field.changed
                }
            )*

            /// Name and changed stamp of every versioned field
            pub fn changed_stamps(&self) -> Vec<(&'static str, i64)> {
                vec![ $( (stringify!($field), self.fields.$field.changed), )* ]
            }

            /// JSON values of the fields written after `since`
            pub fn changed_fields_since(&self, since: i64) -> Map<String, Value> {
                let mut map = Map::new();
                $(
                    if self.fields.$field.changed > since {
                        let value = serde_json::to_value(&self.fields.$field.value)
                            .unwrap_or(Value::Null);
                        map.insert(stringify!($field).to_string(), value);
                    }
                )*
                map
            }
        }
    };
}

versioned_fields! {
    /// 24-bit transponder address as six hex digits
    icao24, set_icao24, icao24_changed: String;
    icao24_invalid, set_icao24_invalid, icao24_invalid_changed: bool;
    icao24_country, set_icao24_country, icao24_country_changed: Option<String>;
    registration, set_registration, registration_changed: Option<String>;
    /// Altitude in feet
    altitude, set_altitude, altitude_changed: Option<i32>;
    altitude_type, set_altitude_type, altitude_type_changed: AltitudeType;
    geometric_altitude, set_geometric_altitude, geometric_altitude_changed: Option<i32>;
    air_pressure_in_hg, set_air_pressure_in_hg, air_pressure_in_hg_changed: Option<f32>;
    target_altitude, set_target_altitude, target_altitude_changed: Option<i32>;
    callsign, set_callsign, callsign_changed: Option<String>;
    callsign_is_suspect, set_callsign_is_suspect, callsign_is_suspect_changed: bool;
    latitude, set_latitude, latitude_changed: Option<f64>;
    longitude, set_longitude, longitude_changed: Option<f64>;
    /// Source time of the last fix that moved the aircraft
    position_time, set_position_time, position_time_changed: Option<DateTime<Utc>>;
    position_is_mlat, set_position_is_mlat, position_is_mlat_changed: Option<bool>;
    position_receiver_id, set_position_receiver_id, position_receiver_id_changed: Option<u32>;
    is_tisb, set_is_tisb, is_tisb_changed: bool;
    /// Ground speed in knots
    ground_speed, set_ground_speed, ground_speed_changed: Option<f32>;
    ground_speed_type, set_ground_speed_type, ground_speed_type_changed: SpeedType;
    /// Track in degrees from true north
    track, set_track, track_changed: Option<f32>;
    track_is_heading, set_track_is_heading, track_is_heading_changed: bool;
    target_track, set_target_track, target_track_changed: Option<f32>;
    /// Vertical rate in feet per minute
    vertical_rate, set_vertical_rate, vertical_rate_changed: Option<i32>;
    vertical_rate_type, set_vertical_rate_type, vertical_rate_type_changed: AltitudeType;
    squawk, set_squawk, squawk_changed: Option<u16>;
    emergency, set_emergency, emergency_changed: Option<bool>;
    ident_active, set_ident_active, ident_active_changed: Option<bool>;
    on_ground, set_on_ground, on_ground_changed: Option<bool>;
    signal_level, set_signal_level, signal_level_changed: Option<i32>;
    receiver_id, set_receiver_id, receiver_id_changed: u32;
    transponder_type, set_transponder_type, transponder_type_changed: TransponderType;
    /// ICAO type designator
    type_code, set_type_code, type_code_changed: Option<String>;
    manufacturer, set_manufacturer, manufacturer_changed: Option<String>;
    model, set_model, model_changed: Option<String>;
    construction_number, set_construction_number, construction_number_changed: Option<String>;
    year_built, set_year_built, year_built_changed: Option<String>;
    origin, set_origin, origin_changed: Option<String>;
    destination, set_destination, destination_changed: Option<String>;
    stopovers, set_stopovers, stopovers_changed: Vec<String>;
    operator, set_operator, operator_changed: Option<String>;
    operator_icao, set_operator_icao, operator_icao_changed: Option<String>;
    wake_turbulence_category, set_wake_turbulence_category, wake_turbulence_category_changed: WakeTurbulenceCategory;
    engine_type, set_engine_type, engine_type_changed: EngineType;
    engine_placement, set_engine_placement, engine_placement_changed: EnginePlacement;
    number_of_engines, set_number_of_engines, number_of_engines_changed: Option<String>;
    species, set_species, species_changed: Species;
    is_military, set_is_military, is_military_changed: bool;
    picture_file_name, set_picture_file_name, picture_file_name_changed: Option<String>;
    picture_width, set_picture_width, picture_width_changed: i32;
    picture_height, set_picture_height, picture_height_changed: i32;
    flights_count, set_flights_count, flights_count_changed: i32;
    count_messages_received, set_count_messages_received, count_messages_received_changed: i64;
    is_interesting, set_is_interesting, is_interesting_changed: bool;
    user_notes, set_user_notes, user_notes_changed: Option<String>;
    user_tag, set_user_tag, user_tag_changed: Option<String>;
    is_charter_flight, set_is_charter_flight, is_charter_flight_changed: bool;
    is_positioning_flight, set_is_positioning_flight, is_positioning_flight_changed: bool;
    first_seen, set_first_seen, first_seen_changed: Option<DateTime<Utc>>;
}

/// State of one tracked aircraft.
///
/// `clone()` is a deep copy: the trails are copied element by element, so a
/// clone never observes later writes to the original.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftState {
    unique_id: u32,
    data_version: i64,
    fields: Fields,
    trail: CoordinateTrail,
    trail_reset_changed: i64,
}

impl AircraftState {
    pub fn new(unique_id: u32, icao24: impl Into<String>) -> Self {
        let mut fields = Fields::default();
        fields.icao24.value = icao24.into();
        Self {
            unique_id,
            data_version: 0,
            fields,
            trail: CoordinateTrail::new(),
            trail_reset_changed: 0,
        }
    }

    /// Identifier for the life of the track
    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub fn data_version(&self) -> i64 {
        self.data_version
    }

    /// Sets the version stamped onto every field written until the next call
    pub fn set_data_version(&mut self, version: i64) {
        self.data_version = version;
    }

    pub fn full_coordinates(&self) -> &[Coordinate] {
        self.trail.full()
    }

    pub fn short_coordinates(&self) -> &[Coordinate] {
        self.trail.short()
    }

    pub fn first_coordinate_changed(&self) -> i64 {
        self.trail.first_changed()
    }

    pub fn last_coordinate_changed(&self) -> i64 {
        self.trail.last_changed()
    }

    pub fn latest_coordinate_time(&self) -> DateTime<Utc> {
        self.trail.latest_time()
    }

    /// Data version of the last `reset_coordinates`, 0 when never reset
    pub fn trail_reset_changed(&self) -> i64 {
        self.trail_reset_changed
    }

    /// True when any field or the trail was written after `since`
    pub fn has_changed_since(&self, since: i64) -> bool {
        self.trail.last_changed() > since
            || self.trail.first_changed() > since
            || self.trail_reset_changed > since
            || self.changed_stamps().iter().any(|(_, stamp)| *stamp > since)
    }

    /// Fold the current position, track, altitude and speed into the trails.
    /// `position_time` moves only when latitude or longitude was written
    /// under the current data version.
    pub fn update_coordinates(
        &mut self,
        time: DateTime<Utc>,
        short_trail_seconds: i64,
        config: &TrailConfig,
    ) -> TrailUpdate {
        let sample = TrailSample {
            latitude: *self.latitude(),
            longitude: *self.longitude(),
            track: *self.track(),
            altitude: *self.altitude(),
            ground_speed: *self.ground_speed(),
            data_version: self.data_version,
            time,
        };
        let written = self.latitude_changed() == self.data_version
            || self.longitude_changed() == self.data_version;
        let outcome = self.trail.update(&sample, short_trail_seconds, config);
        if written && sample.latitude.is_some() && sample.longitude.is_some() {
            self.set_position_time(Some(time));
        }
        outcome
    }

    /// Discard the trails, keeping all other telemetry
    pub fn reset_coordinates(&mut self) {
        self.trail.reset();
        self.trail_reset_changed = self.data_version;
    }
}
