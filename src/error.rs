// src/error.rs

//! Errors surfaced to the user by marker operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkerError {
    /// End time is not strictly after the start time.
    #[error("end time {end:.2}s must be greater than start time {start:.2}s")]
    InvalidRange { start: f64, end: f64 },

    /// Mark end was requested without a captured start.
    #[error("mark a start time first")]
    NoPendingStart,

    /// An audio source could not be opened or decoded.
    #[error("could not load audio from {path}: {reason}")]
    ResourceLoad { path: String, reason: String },
}

impl MarkerError {
    pub fn resource_load(path: &str, err: &anyhow::Error) -> Self {
        MarkerError::ResourceLoad {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }
}
