//! # Error Module
//!
//! Error types for the pitch tracking pipeline.
//!
//! Nothing in this crate is fatal to the host process: a failed `start()`
//! leaves the session idle and may be retried, and analysis-time conditions
//! (insufficient data, silence, no reliable pitch) are not errors at all.

use thiserror::Error;

use crate::format::SampleEncoding;

/// Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or analysing audio.
#[derive(Error, Debug)]
pub enum Error {
    /// No capture device could be found or opened.
    #[error("No input device available: {0}")]
    DeviceUnavailable(String),

    /// Neither the requested format nor the device's preferred format is usable.
    #[error("Format negotiation failed: {0}")]
    FormatNegotiation(String),

    /// The device accepted the format but did not hand back a readable stream.
    #[error("Capture stream unavailable: {0}")]
    StreamUnavailable(String),

    /// The chunk's sample encoding cannot be decoded.
    ///
    /// The session drops such chunks instead of surfacing this to the caller.
    #[error("Unsupported sample encoding: {0:?}")]
    UnsupportedEncoding(SampleEncoding),

    /// The analysis window cannot hold the lag range implied by the frequency band.
    #[error(
        "Window of {window} samples too short for lag range {min_lag}..={max_lag}"
    )]
    WindowTooShort {
        window: usize,
        min_lag: usize,
        max_lag: usize,
    },

    /// A configuration value is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error reading or writing a configuration file.
    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Error (de)serialising a configuration file.
    #[error("Config format error: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    /// Error reported by the audio backend.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
