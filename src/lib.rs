//! airtrack: versioned aircraft state, position trails and sanity checking
//! for live aircraft tracking.

pub mod aircraft;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod feed;
pub mod greatcircle;
pub mod sanity;
pub mod store;
pub mod sync;
pub mod trail;

pub use aircraft::AircraftState;
pub use coordinate::Coordinate;
pub use error::{Result, TrackError};
pub use sanity::{Certainty, SanityChecker};
pub use store::{AircraftStateStore, Snapshot};
pub use trail::CoordinateTrail;
