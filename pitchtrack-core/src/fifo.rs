//! # Sample FIFO Module
//!
//! A bounded, insertion-ordered queue of mono samples. New samples are
//! appended at the back; once the bound is exceeded the oldest samples are
//! discarded from the front.

use std::collections::VecDeque;

/// Bounded FIFO of normalised mono samples.
#[derive(Debug, Clone)]
pub struct SampleFifo {
    samples: VecDeque<f32>,
    max_len: usize,
}

impl SampleFifo {
    /// Creates an empty FIFO sized for `sample_rate` and `window_size`.
    pub fn new(sample_rate: u32, window_size: usize) -> Self {
        let max_len = Self::bound(sample_rate, window_size);
        Self {
            // ~1s up front, grows to the bound if needed.
            samples: VecDeque::with_capacity(sample_rate as usize),
            max_len,
        }
    }

    /// Maximum number of samples retained: `max(sr + window, 1.5 * sr)`.
    pub fn bound(sample_rate: u32, window_size: usize) -> usize {
        let sr = sample_rate as usize;
        (sr + window_size).max(sr * 3 / 2)
    }

    /// Recomputes the bound, trimming immediately if it shrank.
    pub fn set_bound(&mut self, sample_rate: u32, window_size: usize) {
        self.max_len = Self::bound(sample_rate, window_size);
        self.trim();
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends samples, then evicts from the front down to the bound.
    pub fn extend<I: IntoIterator<Item = f32>>(&mut self, samples: I) {
        self.samples.extend(samples);
        self.trim();
    }

    /// Copies the newest `n` samples, oldest first.
    ///
    /// Returns `None` while fewer than `n` samples are buffered.
    pub fn latest(&self, n: usize) -> Option<Vec<f32>> {
        if n == 0 || self.samples.len() < n {
            return None;
        }
        let start = self.samples.len() - n;
        Some(self.samples.range(start..).copied().collect())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn trim(&mut self) {
        if self.samples.len() > self.max_len {
            let drop = self.samples.len() - self.max_len;
            self.samples.drain(..drop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_takes_the_larger_of_both_rules() {
        // 1.5 * sr wins for the default window.
        assert_eq!(SampleFifo::bound(48000, 4096), 72000);
        // sr + window wins for very large windows.
        assert_eq!(SampleFifo::bound(8000, 16384), 24384);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut fifo = SampleFifo::new(1000, 10);
        assert_eq!(fifo.max_len(), 1500);

        fifo.extend((0..2000).map(|i| i as f32));
        assert_eq!(fifo.len(), 1500);
        // Oldest 500 samples are gone.
        let window = fifo.latest(1500).unwrap();
        assert_eq!(window[0], 500.0);
        assert_eq!(*window.last().unwrap(), 1999.0);
    }

    #[test]
    fn latest_requires_enough_samples() {
        let mut fifo = SampleFifo::new(1000, 10);
        fifo.extend([0.1, 0.2, 0.3]);
        assert!(fifo.latest(4).is_none());
        assert_eq!(fifo.latest(2), Some(vec![0.2, 0.3]));
        assert!(fifo.latest(0).is_none());
    }

    #[test]
    fn length_never_exceeds_bound_across_many_pushes() {
        let mut fifo = SampleFifo::new(48000, 4096);
        for chunk in 0..100 {
            fifo.extend(std::iter::repeat(0.0).take(997 + chunk));
            assert!(fifo.len() <= fifo.max_len());
        }
    }

    #[test]
    fn shrinking_the_bound_trims_immediately() {
        let mut fifo = SampleFifo::new(48000, 4096);
        fifo.extend(std::iter::repeat(0.5).take(70000));
        fifo.set_bound(8000, 1024);
        assert_eq!(fifo.len(), 12000);
    }
}
