//! # Capture Session Module
//!
//! Owns the capture lifecycle and drives the analysis pipeline.
//!
//! ## Lifecycle
//! `Idle -> Running -> Idle`. `start()` negotiates a format, opens a fresh
//! stream and emits `Started`; `stop()` halts and drops the stream and emits
//! `Stopped`. Both are idempotent.
//!
//! ## Data flow
//! Every `on_data_ready()` call pushes new bytes through ingest into the
//! FIFO. Analysis (windowing, autocorrelation, note mapping) only runs once
//! at least `process_interval_ms` has elapsed since the previous analysis.
//!
//! Everything happens synchronously on the caller's sequence; nothing in
//! here blocks, sleeps or spawns threads.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::time::Instant;

use crate::capture::{CaptureDevice, CaptureStream, negotiate_format};
use crate::config::TrackerConfig;
use crate::error::Error;
use crate::fifo::SampleFifo;
use crate::format::AudioFormat;
use crate::ingest;
use crate::pitch;
use crate::window::AnalysisWindow;
use crate::{Detection, NoteReading, TrackerEvent};

/// Capture session states. There is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// A capture session over a device `D`.
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    config: TrackerConfig,
    state: SessionState,
    format: Option<AudioFormat>,
    stream: Option<Box<dyn CaptureStream>>,
    fifo: SampleFifo,
    last_analysis: Instant,
    events: Sender<TrackerEvent>,
    last_error: Option<Error>,
    // One warning per session for each degraded path.
    warned_encoding: bool,
    warned_window: bool,
}

impl<D: CaptureDevice> CaptureSession<D> {
    /// Creates an idle session and the receiver its events are delivered to.
    pub fn new(device: D, config: TrackerConfig) -> (Self, Receiver<TrackerEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let fifo = SampleFifo::new(config.target_sample_rate, config.analysis_window_size);
        let session = Self {
            device,
            config,
            state: SessionState::Idle,
            format: None,
            stream: None,
            fifo,
            last_analysis: Instant::now(),
            events,
            last_error: None,
            warned_encoding: false,
            warned_window: false,
        };
        (session, receiver)
    }

    /// Starts capturing.
    ///
    /// Returns `true` if the session is running afterwards. Already running
    /// sessions return `true` without side effects. On failure the session
    /// stays idle, the reason is kept in [`last_error`](Self::last_error), and
    /// the call may simply be retried.
    pub fn start(&mut self) -> bool {
        if self.state == SessionState::Running {
            return true;
        }

        let wanted = AudioFormat::mono_i16(self.config.target_sample_rate);
        let format = match negotiate_format(&self.device, wanted) {
            Ok(format) => format,
            Err(e) => return self.fail_start(e),
        };

        // Never resurrect an old stream.
        if let Some(mut stale) = self.stream.take() {
            stale.halt();
        }
        let stream = match self.device.open(&format) {
            Ok(stream) => stream,
            Err(e) => return self.fail_start(e),
        };

        self.stream = Some(stream);
        self.format = Some(format);
        self.fifo = SampleFifo::new(format.sample_rate, self.config.analysis_window_size);
        self.last_analysis = Instant::now();
        self.last_error = None;
        self.warned_encoding = false;
        self.warned_window = false;
        self.state = SessionState::Running;

        info!("[SESSION] Started on {} at {}", self.device.name(), format);
        self.emit(TrackerEvent::Started(format));
        true
    }

    /// Stops capturing. No analysis runs after this returns.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }

        if let Some(mut stream) = self.stream.take() {
            stream.halt();
        }
        self.fifo.clear();
        self.state = SessionState::Idle;

        info!("[SESSION] Stopped");
        self.emit(TrackerEvent::Stopped);
    }

    /// Data-ready notification: reads new bytes and analyses when due.
    pub fn on_data_ready(&mut self) {
        self.on_data_ready_at(Instant::now());
    }

    /// [`on_data_ready`](Self::on_data_ready) against an explicit monotonic time.
    pub fn on_data_ready_at(&mut self, now: Instant) {
        if self.state != SessionState::Running {
            return;
        }
        let (Some(stream), Some(format)) = (self.stream.as_mut(), self.format) else {
            return;
        };

        let bytes = stream.read_available();
        if bytes.is_empty() {
            return;
        }

        self.fifo
            .set_bound(format.sample_rate, self.config.analysis_window_size);
        match ingest::ingest(&bytes, &format, &mut self.fifo) {
            Ok(count) => debug!("[SESSION] Ingested {} samples ({} buffered)", count, self.fifo.len()),
            Err(e) => {
                if !self.warned_encoding {
                    warn!("[SESSION] Dropping captured audio: {}", e);
                    self.warned_encoding = true;
                }
            }
        }

        if now.saturating_duration_since(self.last_analysis) >= self.config.process_interval() {
            self.process_analysis(format.sample_rate);
            self.last_analysis = now;
        }
    }

    /// Analyses the newest window and emits `PitchFrequency` then `NoteUpdate`.
    ///
    /// Does nothing while fewer than `analysis_window_size` samples are buffered.
    fn process_analysis(&mut self, sample_rate: u32) {
        let Some(window) = AnalysisWindow::from_fifo(&self.fifo, self.config.analysis_window_size)
        else {
            return;
        };

        let detection = match analyze_window(&window, sample_rate, &self.config) {
            Ok(detection) => detection,
            Err(e) => {
                if !self.warned_window {
                    warn!("[SESSION] Analysis skipped: {}", e);
                    self.warned_window = true;
                }
                Detection::NoPitch
            }
        };

        let estimate = detection.estimate();
        self.emit(TrackerEvent::PitchFrequency {
            hz: estimate.frequency_hz,
            confidence: estimate.confidence,
        });
        self.emit(TrackerEvent::NoteUpdate(detection.reading()));
    }

    fn fail_start(&mut self, error: Error) -> bool {
        warn!("[SESSION] start() failed on {}: {}", self.device.name(), error);
        self.last_error = Some(error);
        false
    }

    fn emit(&self, event: TrackerEvent) {
        if self.events.send(event).is_err() {
            debug!("[SESSION] No event receiver, dropping event");
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Format of the current (or most recent) capture.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Mutable access to the configuration; changes apply from the next tick.
    pub fn config_mut(&mut self) -> &mut TrackerConfig {
        &mut self.config
    }

    /// Samples currently buffered in the FIFO.
    pub fn buffered_samples(&self) -> usize {
        self.fifo.len()
    }

    /// Why the last `start()` failed, if it did.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs silence gating, pitch estimation and note mapping on a conditioned window.
///
/// # Errors
/// Propagates estimator errors (`WindowTooShort`, `InvalidConfig`); the
/// session reports those ticks as [`Detection::NoPitch`].
pub fn analyze_window(
    window: &AnalysisWindow,
    sample_rate: u32,
    config: &TrackerConfig,
) -> crate::Result<Detection> {
    if window.is_silent(config.silence_rms_threshold) {
        return Ok(Detection::Silence);
    }

    let estimate = pitch::detect_pitch_acf(
        window.samples(),
        sample_rate,
        config.min_frequency_hz,
        config.max_frequency_hz,
    )?;

    Ok(match estimate {
        Some(estimate) if estimate.frequency_hz > 0.0 => Detection::Pitch(
            NoteReading::from_frequency(estimate.frequency_hz, estimate.confidence),
        ),
        _ => Detection::NoPitch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockCaptureDevice, MockCaptureStream};
    use crate::format::SampleEncoding;
    use crate::synth::SyntheticDevice;
    use std::time::Duration;

    fn drain(receiver: &Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
        receiver.try_iter().collect()
    }

    fn halting_stream() -> Box<dyn CaptureStream> {
        let mut stream = MockCaptureStream::new();
        stream.expect_halt().return_const(());
        Box::new(stream)
    }

    fn accepting_device() -> MockCaptureDevice {
        let mut device = MockCaptureDevice::new();
        device.expect_name().return_const("mock mic".to_string());
        device.expect_supports().return_const(true);
        device
    }

    #[test]
    fn start_twice_opens_one_stream_and_emits_one_started() {
        let mut device = accepting_device();
        device.expect_open().times(1).returning(|_| {
            Ok(halting_stream())
        });

        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        assert!(session.start());
        assert!(session.is_running());

        let started: Vec<_> = drain(&events)
            .into_iter()
            .filter(|e| matches!(e, TrackerEvent::Started(_)))
            .collect();
        assert_eq!(started, vec![TrackerEvent::Started(AudioFormat::mono_i16(48000))]);
    }

    #[test]
    fn stop_is_idempotent_and_halts_the_stream() {
        let mut device = accepting_device();
        device.expect_open().times(1).returning(|_| {
            let mut stream = MockCaptureStream::new();
            stream.expect_halt().times(1).return_const(());
            Ok(Box::new(stream) as Box<dyn CaptureStream>)
        });

        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        session.stop();
        assert!(drain(&events).is_empty());

        assert!(session.start());
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);

        let events = drain(&events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], TrackerEvent::Stopped);
    }

    #[test]
    fn failed_open_leaves_session_idle_and_retryable() {
        let mut device = accepting_device();
        let mut attempts = 0;
        device.expect_open().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(Error::StreamUnavailable("busy".into()))
            } else {
                Ok(halting_stream())
            }
        });

        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(!session.start());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(session.last_error(), Some(Error::StreamUnavailable(_))));
        assert!(drain(&events).is_empty());

        assert!(session.start());
        assert!(session.last_error().is_none());
    }

    #[test]
    fn restart_opens_a_fresh_stream() {
        let mut device = accepting_device();
        device.expect_open().times(2).returning(|_| {
            Ok(halting_stream())
        });

        let (mut session, _events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        session.stop();
        assert!(session.start());
    }

    #[test]
    fn preferred_format_is_adopted() {
        let preferred = AudioFormat::new(44100, 2, SampleEncoding::Float32);
        let mut device = MockCaptureDevice::new();
        device.expect_name().return_const("mock mic".to_string());
        device.expect_supports().return_const(false);
        device.expect_preferred_format().returning(move || Ok(preferred));
        device
            .expect_open()
            .withf(move |format| *format == preferred)
            .times(1)
            .returning(|_| {
                Ok(halting_stream())
            });

        let (mut session, _events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        assert_eq!(session.format(), Some(preferred));
    }

    #[test]
    fn analysis_is_throttled_to_the_process_interval() {
        let device = SyntheticDevice::sine(440.0, 0.5).with_frames_per_read(4800);
        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        drain(&events);

        let t0 = Instant::now();
        // Too early: data is buffered but not analysed.
        session.on_data_ready_at(t0);
        assert_eq!(session.buffered_samples(), 4800);
        assert!(drain(&events).is_empty());

        session.on_data_ready_at(t0 + Duration::from_millis(45));
        assert_eq!(drain(&events).len(), 2);

        // 20 ms after the previous analysis: skipped.
        session.on_data_ready_at(t0 + Duration::from_millis(65));
        assert!(drain(&events).is_empty());

        session.on_data_ready_at(t0 + Duration::from_millis(90));
        assert_eq!(drain(&events).len(), 2);
    }

    #[test]
    fn insufficient_data_emits_nothing() {
        let device = SyntheticDevice::sine(440.0, 0.5).with_frames_per_read(1000);
        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        drain(&events);

        session.on_data_ready_at(Instant::now() + Duration::from_millis(100));
        assert_eq!(session.buffered_samples(), 1000);
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn no_analysis_after_stop() {
        let device = SyntheticDevice::sine(440.0, 0.5).with_frames_per_read(8192);
        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        session.stop();
        drain(&events);

        session.on_data_ready_at(Instant::now() + Duration::from_secs(1));
        assert!(drain(&events).is_empty());
        assert_eq!(session.buffered_samples(), 0);
    }

    #[test]
    fn unsupported_encoding_is_dropped_silently() {
        let unknown = AudioFormat::new(48000, 1, SampleEncoding::Unknown);
        let device = SyntheticDevice::sine(440.0, 0.5)
            .with_supported(vec![])
            .with_preferred(unknown)
            .with_frames_per_read(8192);
        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        drain(&events);

        session.on_data_ready_at(Instant::now() + Duration::from_millis(100));
        assert_eq!(session.buffered_samples(), 0);
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn window_too_short_reports_idle_reading() {
        let device = SyntheticDevice::sine(440.0, 0.5).with_frames_per_read(8192);
        let mut config = TrackerConfig::default();
        // 48000 / 10 Hz = 4800 lags, more than the 4096 window holds.
        config.set_min_frequency(10.0);
        let (mut session, events) = CaptureSession::new(device, config);
        assert!(session.start());
        drain(&events);

        session.on_data_ready_at(Instant::now() + Duration::from_millis(100));
        assert_eq!(
            drain(&events),
            vec![
                TrackerEvent::PitchFrequency { hz: 0.0, confidence: 0.0 },
                TrackerEvent::NoteUpdate(NoteReading::IDLE),
            ]
        );
    }

    #[test]
    fn config_changes_apply_on_next_tick() {
        let device = SyntheticDevice::sine(440.0, 0.2).with_frames_per_read(8192);
        let (mut session, events) = CaptureSession::new(device, TrackerConfig::default());
        assert!(session.start());
        drain(&events);

        let t0 = Instant::now();
        session.on_data_ready_at(t0 + Duration::from_millis(100));
        let first = drain(&events);
        assert!(matches!(
            first[1],
            TrackerEvent::NoteUpdate(reading) if reading.midi == 69 && !reading.is_idle()
        ));

        // Tapered RMS of a 0.2 sine is about 0.087, now below the gate.
        session.config_mut().set_silence_rms_threshold(0.1);
        session.on_data_ready_at(t0 + Duration::from_millis(200));
        let second = drain(&events);
        assert_eq!(second[1], TrackerEvent::NoteUpdate(NoteReading::IDLE));
    }

    #[test]
    fn analyze_window_gates_only_quiet_windows() {
        let config = TrackerConfig::default();
        let silent = AnalysisWindow::condition(vec![0.0; 4096]);
        assert_eq!(
            analyze_window(&silent, 48000, &config).unwrap(),
            Detection::Silence
        );

        // White-ish noise from a simple LCG: loud, but aperiodic.
        let mut state: u32 = 12345;
        let noise: Vec<f32> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        let noisy = AnalysisWindow::condition(noise);
        let detection = analyze_window(&noisy, 48000, &config).unwrap();
        assert_ne!(detection, Detection::Silence);
    }
}
