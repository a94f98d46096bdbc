//! # Pitch Detection Module
//!
//! Fundamental frequency estimation by time-domain autocorrelation.
//!
//! ## Features
//! - Lag search bounded by the configured frequency band
//! - Parabolic interpolation for sub-sample accuracy
//! - Confidence from the normalised autocorrelation peak
//!
//! The raw autocorrelation costs `O(N * max_lag)`, and `max_lag` grows as the
//! minimum frequency falls, so window size and frequency floor together bound
//! the work per analysis tick.

use crate::PitchEstimate;
use crate::error::{Error, Result};

/// Lower bound on `R[0]` so the confidence ratio never divides by zero.
const R0_EPSILON: f64 = 1e-9;

/// Smallest curvature accepted by the parabolic refinement.
const CURVATURE_EPSILON: f64 = 1e-12;

/// Lag search range `(min_lag, max_lag)` in samples for a frequency band.
///
/// `min_lag` corresponds to the highest frequency (floored at 20 Hz) and
/// `max_lag` to the lowest (floored at 1 Hz).
pub fn lag_range(sample_rate: u32, min_frequency: f64, max_frequency: f64) -> (usize, usize) {
    let sr = sample_rate as f64;
    let min_lag = (sr / max_frequency.max(20.0)).floor() as usize;
    let max_lag = (sr / min_frequency.max(1.0)).floor() as usize;
    (min_lag, max_lag)
}

/// Raw (unnormalised) autocorrelation `R[k] = sum x[i] * x[i + k]` for `k` in `0..=max_lag`.
///
/// `max_lag` must be smaller than `signal.len()`.
pub fn autocorrelation(signal: &[f32], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|k| {
            signal[..signal.len() - k]
                .iter()
                .zip(&signal[k..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect()
}

/// Estimates the fundamental frequency of a conditioned window.
///
/// # Arguments
/// * `signal` - De-meaned, tapered analysis window
/// * `sample_rate` - Sample rate in Hz
/// * `min_frequency` / `max_frequency` - Search band in Hz
///
/// # Returns
/// * `Ok(Some(estimate))` - Pitch found inside the band
/// * `Ok(None)` - The refined peak falls outside the band (no reliable pitch)
/// * `Err(Error::WindowTooShort)` - The window cannot hold `max_lag + 1` lags,
///   or `min_lag` is below 2
pub fn detect_pitch_acf(
    signal: &[f32],
    sample_rate: u32,
    min_frequency: f64,
    max_frequency: f64,
) -> Result<Option<PitchEstimate>> {
    let n = signal.len();
    let (min_lag, max_lag) = lag_range(sample_rate, min_frequency, max_frequency);
    if max_lag + 1 >= n || min_lag < 2 {
        return Err(Error::WindowTooShort {
            window: n,
            min_lag,
            max_lag,
        });
    }
    if min_lag >= max_lag {
        return Err(Error::InvalidConfig(format!(
            "empty frequency band {min_frequency}..{max_frequency} Hz"
        )));
    }

    let r = autocorrelation(signal, max_lag);
    let r0 = r[0].max(R0_EPSILON);

    // Global peak over [min_lag, max_lag - 1]; the first of equal peaks wins.
    let mut best_lag = min_lag;
    let mut best_val = f64::NEG_INFINITY;
    for (k, &value) in r.iter().enumerate().take(max_lag).skip(min_lag) {
        if value > best_val {
            best_val = value;
            best_lag = k;
        }
    }

    let lag = refine_lag(&r, best_lag, max_lag);
    let confidence = (best_val / r0).clamp(0.0, 1.0);

    let frequency = sample_rate as f64 / lag;
    if !frequency.is_finite() || frequency < min_frequency || frequency > max_frequency {
        return Ok(None);
    }

    Ok(Some(PitchEstimate {
        frequency_hz: frequency,
        confidence,
    }))
}

/// Parabolic interpolation through `R[best-1]`, `R[best]`, `R[best+1]`.
fn refine_lag(r: &[f64], best_lag: usize, max_lag: usize) -> f64 {
    let lag = best_lag as f64;
    if best_lag <= 1 || best_lag >= max_lag {
        return lag;
    }

    let y1 = r[best_lag - 1];
    let y2 = r[best_lag];
    let y3 = r[best_lag + 1];

    let curvature = y1 - 2.0 * y2 + y3;
    if curvature.abs() > CURVATURE_EPSILON {
        lag + 0.5 * (y1 - y3) / curvature
    } else {
        lag
    }
}
