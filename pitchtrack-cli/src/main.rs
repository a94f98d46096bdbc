//! # pitchtrack - terminal tuner
//!
//! Listens on a microphone (or a synthetic sine) and prints the detected note,
//! its deviation in cents, the frequency and the confidence.
//!
//! ## Architecture
//! - **Main Thread**: owns the capture session and drives it from a 5 ms ticker
//! - **Audio Thread**: cpal's callback thread, which only forwards raw bytes
//! - **Communication**: crossbeam channels for bytes and tracker events

use anyhow::{Context, bail};
use clap::Parser;
use crossbeam_channel::Receiver;
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use pitchtrack_core::audio::{self, CpalDevice};
use pitchtrack_core::capture::CaptureDevice;
use pitchtrack_core::config;
use pitchtrack_core::synth::SyntheticDevice;
use pitchtrack_core::tuning::Accidentals;
use pitchtrack_core::{CaptureSession, NoteReading, TrackerConfig, TrackerEvent};

/// How often the session is polled for new audio.
const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Real-time pitch tracker for the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// List the available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Name of the input device (defaults to the system default)
    #[arg(short, long)]
    device: Option<String>,

    /// Track a synthetic sine at this frequency instead of a microphone
    #[arg(long, value_name = "HZ")]
    simulate: Option<f64>,

    /// Stop after this many seconds (runs until interrupted otherwise)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Load tracker settings from a JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective tracker settings to a JSON file
    #[arg(long, value_name = "PATH")]
    save_config: Option<PathBuf>,

    /// Start from the handheld preset (wider band, more sensitive gate)
    #[arg(long)]
    handheld: bool,

    /// Lowest frequency searched, in Hz
    #[arg(long)]
    min_freq: Option<f64>,

    /// Highest frequency searched, in Hz
    #[arg(long)]
    max_freq: Option<f64>,

    /// Samples per analysis window
    #[arg(long)]
    window: Option<usize>,

    /// Minimum time between analyses, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// RMS below which a window counts as silence
    #[arg(long)]
    silence: Option<f64>,

    /// Sample rate requested from the device
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Spell accidentals as flats (Bb instead of A#)
    #[arg(long)]
    flats: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        for name in audio::list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let tracker_config = build_config(&args)?;
    if let Some(path) = &args.save_config {
        config::save(&tracker_config, path)
            .with_context(|| format!("saving settings to {}", path.display()))?;
        info!("[MAIN] Settings written to {}", path.display());
    }

    let accidentals = if args.flats {
        Accidentals::Flats
    } else {
        Accidentals::Sharps
    };
    let duration = args.duration_secs.map(Duration::from_secs);

    match args.simulate {
        Some(hz) => {
            let device = SyntheticDevice::sine(hz, 0.5).with_real_time_pacing();
            run(device, tracker_config, accidentals, duration)
        }
        None => {
            let device = match &args.device {
                Some(name) => CpalDevice::by_name(name)?,
                None => CpalDevice::default_input()?,
            };
            run(device, tracker_config, accidentals, duration)
        }
    }
}

/// Settings file (or preset), then individual flags on top.
fn build_config(args: &Args) -> anyhow::Result<TrackerConfig> {
    let mut tracker_config = match &args.config {
        Some(path) => config::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None if args.handheld => TrackerConfig::handheld(),
        None => TrackerConfig::default(),
    };

    if let Some(hz) = args.min_freq {
        tracker_config.set_min_frequency(hz);
    }
    if let Some(hz) = args.max_freq {
        tracker_config.set_max_frequency(hz);
    }
    if let Some(samples) = args.window {
        tracker_config.set_analysis_window_size(samples);
    }
    if let Some(ms) = args.interval_ms {
        tracker_config.set_process_interval_ms(ms);
    }
    if let Some(threshold) = args.silence {
        tracker_config.set_silence_rms_threshold(threshold);
    }
    if let Some(rate) = args.sample_rate {
        tracker_config.set_target_sample_rate(rate);
    }
    Ok(tracker_config)
}

fn run<D: CaptureDevice>(
    device: D,
    tracker_config: TrackerConfig,
    accidentals: Accidentals,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    let (mut session, events) = CaptureSession::new(device, tracker_config);
    if !session.start() {
        match session.last_error() {
            Some(e) => bail!("could not start capture: {e}"),
            None => bail!("could not start capture"),
        }
    }

    let deadline = duration.map(|d| Instant::now() + d);
    let ticker = crossbeam_channel::tick(TICK_INTERVAL);
    let mut readout = Readout::new(accidentals);

    loop {
        ticker.recv()?;
        session.on_data_ready();
        readout.drain(&events);

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    session.stop();
    readout.drain(&events);
    Ok(())
}

/// Prints readings, collapsing runs of idle ticks into a single `--`.
struct Readout {
    accidentals: Accidentals,
    idle: bool,
}

impl Readout {
    fn new(accidentals: Accidentals) -> Self {
        Self {
            accidentals,
            idle: false,
        }
    }

    fn drain(&mut self, events: &Receiver<TrackerEvent>) {
        for event in events.try_iter() {
            match event {
                TrackerEvent::Started(format) => println!("listening at {format}"),
                TrackerEvent::Stopped => println!("stopped"),
                TrackerEvent::NoteUpdate(reading) => self.show(&reading),
                TrackerEvent::PitchFrequency { .. } => {}
            }
        }
    }

    fn show(&mut self, reading: &NoteReading) {
        if reading.is_idle() {
            if !self.idle {
                println!("--");
                self.idle = true;
            }
            return;
        }
        self.idle = false;
        println!(
            "{:<3} {:+5.1} cents  {:.1} Hz  conf {:.2}",
            reading.name(self.accidentals),
            reading.cents,
            reading.frequency_hz,
            reading.confidence
        );
    }
}
