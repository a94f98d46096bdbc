//! # Synthetic Capture Module
//!
//! A [`CaptureDevice`] that "records" a pure sine (or silence) instead of a
//! microphone. It encodes into any supported [`AudioFormat`], which makes it
//! useful for exercising the whole pipeline without audio hardware.

use std::time::Instant;

use crate::capture::{CaptureDevice, CaptureStream};
use crate::error::{Error, Result};
use crate::format::{AudioFormat, SampleEncoding};

/// How many frames each `read_available` call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// A fixed number of frames per read.
    Fixed(usize),
    /// As many frames as wall-clock time since the previous read accounts for.
    RealTime,
}

/// A capture device producing a synthetic sine wave.
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    frequency_hz: f64,
    amplitude: f32,
    pacing: Pacing,
    supported: Option<Vec<AudioFormat>>,
    preferred: AudioFormat,
    fail_open: bool,
    opened: usize,
}

impl SyntheticDevice {
    /// A sine at `frequency_hz` with peak `amplitude` (0 to 1).
    pub fn sine(frequency_hz: f64, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            amplitude: amplitude.clamp(0.0, 1.0),
            pacing: Pacing::Fixed(1024),
            supported: None,
            preferred: AudioFormat::new(44100, 2, SampleEncoding::Float32),
            fail_open: false,
            opened: 0,
        }
    }

    /// All-zero samples.
    pub fn silence() -> Self {
        Self::sine(0.0, 0.0)
    }

    pub fn with_frames_per_read(mut self, frames: usize) -> Self {
        self.pacing = Pacing::Fixed(frames);
        self
    }

    pub fn with_real_time_pacing(mut self) -> Self {
        self.pacing = Pacing::RealTime;
        self
    }

    /// Restricts the formats the device reports as supported.
    ///
    /// By default every format with a decodable encoding is supported.
    pub fn with_supported(mut self, formats: Vec<AudioFormat>) -> Self {
        self.supported = Some(formats);
        self
    }

    pub fn with_preferred(mut self, format: AudioFormat) -> Self {
        self.preferred = format;
        self
    }

    /// Makes every `open()` fail, as a busy or revoked microphone would.
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Number of streams opened so far.
    pub fn open_count(&self) -> usize {
        self.opened
    }
}

impl CaptureDevice for SyntheticDevice {
    fn name(&self) -> String {
        format!("synthetic {:.2} Hz", self.frequency_hz)
    }

    fn supports(&self, format: &AudioFormat) -> bool {
        match &self.supported {
            Some(formats) => formats.contains(format),
            None => format.encoding.is_supported(),
        }
    }

    fn preferred_format(&self) -> Result<AudioFormat> {
        Ok(self.preferred)
    }

    fn open(&mut self, format: &AudioFormat) -> Result<Box<dyn CaptureStream>> {
        if self.fail_open {
            return Err(Error::StreamUnavailable(format!(
                "{} refused to open",
                self.name()
            )));
        }
        self.opened += 1;
        Ok(Box::new(SyntheticStream {
            format: *format,
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude,
            pacing: self.pacing,
            position: 0,
            last_read: Instant::now(),
            halted: false,
        }))
    }
}

struct SyntheticStream {
    format: AudioFormat,
    frequency_hz: f64,
    amplitude: f32,
    pacing: Pacing,
    position: u64,
    last_read: Instant,
    halted: bool,
}

impl SyntheticStream {
    fn frames_due(&mut self) -> usize {
        match self.pacing {
            Pacing::Fixed(frames) => frames,
            Pacing::RealTime => {
                let now = Instant::now();
                let elapsed = now.duration_since(self.last_read).as_secs_f64();
                let frames = (elapsed * self.format.sample_rate as f64) as usize;
                // Only advance the clock by whole frames produced.
                if frames > 0 {
                    self.last_read = now;
                }
                frames
            }
        }
    }

    fn next_sample(&mut self) -> f32 {
        let t = self.position as f64 / self.format.sample_rate as f64;
        self.position += 1;
        (self.amplitude as f64 * (2.0 * std::f64::consts::PI * self.frequency_hz * t).sin()) as f32
    }
}

impl CaptureStream for SyntheticStream {
    fn read_available(&mut self) -> Vec<u8> {
        if self.halted {
            return Vec::new();
        }
        let frames = self.frames_due();
        let channels = self.format.channel_count as usize;
        let width = self.format.encoding.bytes_per_sample().unwrap_or(4);

        let mut bytes = Vec::with_capacity(frames * channels * width);
        for _ in 0..frames {
            let value = self.next_sample();
            for _ in 0..channels {
                encode_sample(value, self.format.encoding, &mut bytes);
            }
        }
        bytes
    }

    fn halt(&mut self) {
        self.halted = true;
    }
}

/// Encodes one sample in [-1, 1] as native-endian PCM.
fn encode_sample(value: f32, encoding: SampleEncoding, out: &mut Vec<u8>) {
    match encoding {
        SampleEncoding::Int16 => {
            out.extend_from_slice(&((value * i16::MAX as f32).round() as i16).to_ne_bytes())
        }
        SampleEncoding::Int32 => {
            out.extend_from_slice(&((value as f64 * i32::MAX as f64).round() as i32).to_ne_bytes())
        }
        SampleEncoding::Float32 => out.extend_from_slice(&value.to_ne_bytes()),
        SampleEncoding::UInt8 => out.push(((value * 127.0).round() + 128.0) as u8),
        // Opaque 4-byte words nobody can decode.
        SampleEncoding::Unknown => out.extend_from_slice(&[0xA5; 4]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::decode_chunk;

    #[test]
    fn fixed_pacing_produces_whole_frames() {
        let mut device = SyntheticDevice::sine(440.0, 0.5).with_frames_per_read(100);
        let format = AudioFormat::new(48000, 2, SampleEncoding::Int16);
        let mut stream = device.open(&format).unwrap();
        assert_eq!(stream.read_available().len(), 100 * 2 * 2);
        assert_eq!(device.open_count(), 1);
    }

    #[test]
    fn encodings_decode_back_to_the_sine() {
        for encoding in [
            SampleEncoding::Int16,
            SampleEncoding::Int32,
            SampleEncoding::Float32,
            SampleEncoding::UInt8,
        ] {
            let mut device = SyntheticDevice::sine(1000.0, 0.5).with_frames_per_read(48);
            let format = AudioFormat::new(48000, 2, encoding);
            let mut stream = device.open(&format).unwrap();
            let samples = decode_chunk(&stream.read_available(), &format).unwrap();
            assert_eq!(samples.len(), 48);
            // Quarter period of 1 kHz at 48 kHz is sample 12.
            assert!((samples[12] - 0.5).abs() < 0.01, "{encoding:?}: {}", samples[12]);
            assert!(samples[0].abs() < 0.01, "{encoding:?}: {}", samples[0]);
        }
    }

    #[test]
    fn halted_stream_is_empty() {
        let mut device = SyntheticDevice::silence();
        let mut stream = device.open(&AudioFormat::mono_i16(8000)).unwrap();
        stream.halt();
        assert!(stream.read_available().is_empty());
    }

    #[test]
    fn failing_device_refuses_to_open() {
        let mut device = SyntheticDevice::sine(440.0, 0.5).failing();
        assert!(matches!(
            device.open(&AudioFormat::mono_i16(48000)),
            Err(Error::StreamUnavailable(_))
        ));
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn supported_formats_can_be_restricted() {
        let only = AudioFormat::new(44100, 1, SampleEncoding::Float32);
        let device = SyntheticDevice::silence().with_supported(vec![only]);
        assert!(device.supports(&only));
        assert!(!device.supports(&AudioFormat::mono_i16(48000)));

        let open = SyntheticDevice::silence();
        assert!(open.supports(&AudioFormat::mono_i16(48000)));
        assert!(!open.supports(&AudioFormat::new(48000, 1, SampleEncoding::Unknown)));
    }
}
