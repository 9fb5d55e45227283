//! Error type shared by the beamforming core (types, processing,
//! beamforming, sequencer, attributes).
//!
//! Per-window data insufficiency is not an error: those paths return
//! `Ok(None)` and the window is skipped.

use thiserror::Error;

/// Errors raised by the FK core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FkError {
    /// A required input was absent.
    #[error("Null argument: {0}")]
    NullArgument(String),

    /// Structurally invalid input (empty, duplicate, unknown geometry, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An `FkSpectraDefinition` (or other value type) failed eager validation.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("FFT error: {0}")]
    Fft(String),
}

pub type FkResult<T> = Result<T, FkError>;
