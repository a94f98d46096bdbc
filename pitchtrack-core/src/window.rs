//! # Windowing & Conditioning Module
//!
//! Prepares the newest block of buffered audio for autocorrelation:
//! 1. Copy the newest `analysis_window_size` samples out of the FIFO
//! 2. Remove the DC offset
//! 3. Apply a Hann taper across the whole window
//! 4. Measure RMS for silence gating

use crate::fifo::SampleFifo;

/// A conditioned snapshot of the newest samples.
///
/// Lives only for the duration of one analysis tick.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    samples: Vec<f32>,
    rms: f64,
}

impl AnalysisWindow {
    /// Snapshots and conditions the newest `size` samples of the FIFO.
    ///
    /// Returns `None` when fewer than `size` samples are buffered; the caller
    /// simply skips this tick.
    pub fn from_fifo(fifo: &SampleFifo, size: usize) -> Option<Self> {
        fifo.latest(size).map(Self::condition)
    }

    /// Conditions an owned block of samples in place.
    pub fn condition(mut samples: Vec<f32>) -> Self {
        remove_dc_offset(&mut samples);
        apply_hann_window(&mut samples);
        let rms = rms(&samples);
        Self { samples, rms }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// RMS of the conditioned (de-meaned, tapered) window.
    pub fn rms(&self) -> f64 {
        self.rms
    }

    pub fn is_silent(&self, threshold: f64) -> bool {
        self.rms < threshold
    }
}

/// Subtracts the arithmetic mean so the signal is centred on zero.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let mean = signal.iter().map(|&s| s as f64).sum::<f64>() / len as f64;
    for sample in signal.iter_mut() {
        *sample = (*sample as f64 - mean) as f32;
    }
}

/// Applies a raised-cosine (Hann) taper: weight 0 at both ends, 1 at the centre.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f64;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let weight = 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n_minus_1).cos();
        *sample = (*sample as f64 * weight) as f32;
    }
}

/// Root-mean-square of a block, 0 for an empty block.
pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let energy: f64 = signal.iter().map(|&s| s as f64 * s as f64).sum();
    (energy / signal.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_offset_is_removed() {
        let mut signal = vec![1.5f32, 2.5, 1.5, 2.5];
        remove_dc_offset(&mut signal);
        assert_eq!(signal, vec![-0.5, 0.5, -0.5, 0.5]);
    }

    #[test]
    fn hann_taper_has_zero_edges_and_unit_centre() {
        let mut ones = vec![1.0f32; 101];
        apply_hann_window(&mut ones);
        assert!(ones[0].abs() < 1e-7);
        assert!(ones[100].abs() < 1e-7);
        assert!((ones[50] - 1.0).abs() < 1e-7);
        // Symmetric.
        assert!((ones[10] - ones[90]).abs() < 1e-6);
    }

    #[test]
    fn constant_input_conditions_to_silence() {
        let window = AnalysisWindow::condition(vec![0.3; 2048]);
        assert!(window.rms() < 1e-6);
        assert!(window.is_silent(0.005));
    }

    #[test]
    fn window_requires_enough_buffered_samples() {
        let mut fifo = SampleFifo::new(48000, 4096);
        fifo.extend(std::iter::repeat(0.1).take(4095));
        assert!(AnalysisWindow::from_fifo(&fifo, 4096).is_none());
        fifo.extend([0.1]);
        let window = AnalysisWindow::from_fifo(&fifo, 4096).unwrap();
        assert_eq!(window.len(), 4096);
    }

    #[test]
    fn rms_of_tapered_sine_is_about_root_three_eighths_of_amplitude() {
        let sr = 48000.0;
        let samples: Vec<f32> = (0..4096)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr).sin())
            .collect();
        let window = AnalysisWindow::condition(samples);
        // sqrt(3/8) * A / sqrt(2) for a Hann-weighted sine.
        let expected = 0.5 * (3.0f64 / 8.0).sqrt() / 2f64.sqrt();
        assert!((window.rms() - expected).abs() < 0.005, "rms {}", window.rms());
    }
}
