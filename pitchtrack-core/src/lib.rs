// pitchtrack-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate is responsible for microphone capture, sample buffering,
//! autocorrelation pitch detection and note mapping. It is completely
//! headless and contains no GUI code; consumers receive [`TrackerEvent`]s
//! over a channel.

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod fifo;
pub mod format;
pub mod ingest;
pub mod pitch;
pub mod session;
pub mod synth;
pub mod tuning;
pub mod window;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use format::{AudioFormat, SampleEncoding};
pub use session::{CaptureSession, SessionState};

/// Output of the autocorrelation estimator for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz; 0 means "no pitch".
    pub frequency_hz: f64,
    /// Normalised autocorrelation peak, 0.0 to 1.0.
    pub confidence: f64,
}

impl PitchEstimate {
    pub const NONE: PitchEstimate = PitchEstimate {
        frequency_hz: 0.0,
        confidence: 0.0,
    };
}

/// A frequency mapped onto the nearest MIDI note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteReading {
    /// Nearest MIDI note, 0 to 127.
    pub midi: u8,
    /// Deviation from `midi` in cents, folded into (-50, 50].
    pub cents: f64,
    pub frequency_hz: f64,
    pub confidence: f64,
}

/// Outcome of analysing one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// Window RMS was below the silence threshold.
    Silence,
    /// Signal present, but no pitch inside the configured band.
    NoPitch,
    Pitch(NoteReading),
}

impl Detection {
    /// The reading emitted for this outcome. Silence and no-pitch share the
    /// idle reading (MIDI 69, 0 cents, 0 Hz, confidence 0).
    pub fn reading(&self) -> NoteReading {
        match self {
            Detection::Pitch(reading) => *reading,
            Detection::Silence | Detection::NoPitch => NoteReading::IDLE,
        }
    }

    pub fn estimate(&self) -> PitchEstimate {
        match self {
            Detection::Pitch(reading) => PitchEstimate {
                frequency_hz: reading.frequency_hz,
                confidence: reading.confidence,
            },
            Detection::Silence | Detection::NoPitch => PitchEstimate::NONE,
        }
    }
}

/// Events emitted by a [`CaptureSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Capture began with the negotiated format.
    Started(AudioFormat),
    Stopped,
    /// Detected frequency and confidence; `(0.0, 0.0)` when idle.
    PitchFrequency { hz: f64, confidence: f64 },
    /// Note reading for the same analysis tick as the preceding `PitchFrequency`.
    NoteUpdate(NoteReading),
}
