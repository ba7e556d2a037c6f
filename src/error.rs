//! Error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("aircraft {0} is already registered")]
    DuplicateAircraft(u32),

    #[error("aircraft {0} is not registered")]
    UnknownAircraft(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, TrackError>;
