//! Error types for scanalign

use thiserror::Error;

/// Main error type for scanalign operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Point set is empty")]
    EmptyPointSet,

    #[error("Insufficient correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("Degenerate geometry: rank {rank} of 6, condition number {condition_number:e}")]
    DegenerateGeometry { rank: usize, condition_number: f64 },

    #[error("Closest point index queried before initialization")]
    NotInitialized,

    #[error("Closest point index was built over an empty point set")]
    EmptyIndex,

    #[error("Unknown scan handle: {0}")]
    UnknownScan(usize),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

impl Error {
    /// Whether the caller may simply retry (e.g. with looser thresholds or a new sample)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::UnknownScan(_))
    }
}

/// Result type alias for scanalign operations
pub type Result<T> = std::result::Result<T, Error>;
