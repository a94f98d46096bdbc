//! # Configuration Module
//!
//! Tracker parameters, their clamping rules, and JSON persistence.
//!
//! Configuration is a plain value. A running session reads it at every
//! analysis tick, so changes take effect on the next tick without any
//! synchronisation; callers on another thread must marshal changes onto the
//! capture sequence.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

pub const MIN_FREQUENCY_FLOOR: f64 = 10.0;
pub const MAX_FREQUENCY_FLOOR: f64 = 20.0;
pub const WINDOW_SIZE_FLOOR: usize = 1024;
pub const PROCESS_INTERVAL_FLOOR_MS: u64 = 10;
pub const SILENCE_THRESHOLD_CEILING: f64 = 0.1;

/// Parameters of the pitch tracking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Lowest frequency searched, in Hz.
    pub min_frequency_hz: f64,
    /// Highest frequency searched, in Hz.
    pub max_frequency_hz: f64,
    /// Samples per analysis window.
    pub analysis_window_size: usize,
    /// Minimum time between two analyses, in milliseconds.
    pub process_interval_ms: u64,
    /// Windows whose RMS falls below this are reported as silence.
    pub silence_rms_threshold: f64,
    /// Sample rate requested from the device before falling back to its preferred format.
    pub target_sample_rate: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: 60.0,
            max_frequency_hz: 1200.0,
            analysis_window_size: 4096,
            process_interval_ms: 40,
            silence_rms_threshold: 0.005,
            target_sample_rate: 48000,
        }
    }
}

impl TrackerConfig {
    /// Parameters tuned for phone microphones: wider band, quicker updates,
    /// more sensitive gate.
    pub fn handheld() -> Self {
        Self {
            min_frequency_hz: 40.0,
            max_frequency_hz: 1600.0,
            analysis_window_size: 4096,
            process_interval_ms: 35,
            silence_rms_threshold: 0.003,
            ..Self::default()
        }
    }

    pub fn set_min_frequency(&mut self, hz: f64) {
        self.min_frequency_hz = hz.max(MIN_FREQUENCY_FLOOR);
    }

    pub fn set_max_frequency(&mut self, hz: f64) {
        self.max_frequency_hz = hz.max(MAX_FREQUENCY_FLOOR);
    }

    pub fn set_analysis_window_size(&mut self, samples: usize) {
        self.analysis_window_size = samples.max(WINDOW_SIZE_FLOOR);
    }

    pub fn set_process_interval_ms(&mut self, ms: u64) {
        self.process_interval_ms = ms.max(PROCESS_INTERVAL_FLOOR_MS);
    }

    pub fn set_silence_rms_threshold(&mut self, threshold: f64) {
        self.silence_rms_threshold = threshold.clamp(0.0, SILENCE_THRESHOLD_CEILING);
    }

    pub fn set_target_sample_rate(&mut self, hz: u32) {
        self.target_sample_rate = hz.max(1);
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }

    /// Re-applies every setter's clamping rule, e.g. after deserialising.
    /// Non-finite values fall back to the defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut config = defaults.clone();
        config.set_min_frequency(finite_or(self.min_frequency_hz, defaults.min_frequency_hz));
        config.set_max_frequency(finite_or(self.max_frequency_hz, defaults.max_frequency_hz));
        config.set_analysis_window_size(self.analysis_window_size);
        config.set_process_interval_ms(self.process_interval_ms);
        config.set_silence_rms_threshold(finite_or(
            self.silence_rms_threshold,
            defaults.silence_rms_threshold,
        ));
        config.set_target_sample_rate(self.target_sample_rate);
        config
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Saves a configuration as pretty-printed JSON.
pub fn save(config: &TrackerConfig, path: impl AsRef<Path>) -> Result<()> {
    let json_string = serde_json::to_string_pretty(config)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Loads a configuration from JSON. Missing fields take their defaults and
/// every value is clamped as if set through its setter.
pub fn load(path: impl AsRef<Path>) -> Result<TrackerConfig> {
    let mut file = File::open(path)?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    let config: TrackerConfig = serde_json::from_str(&data)?;
    Ok(config.sanitized())
}
