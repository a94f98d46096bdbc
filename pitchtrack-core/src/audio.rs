//! # Audio Capture Module
//!
//! This module handles real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! It implements [`CaptureDevice`] on top of a cpal input device.
//!
//! ## Features
//! - Default or named input device selection
//! - Format negotiation against the device's supported input configs
//! - Native-endian byte streaming from the cpal callback thread
//!
//! cpal invokes its data callback on its own thread. The callback only
//! copies the raw sample bytes and hands them over a crossbeam channel;
//! all buffering and analysis happen on the thread that owns the
//! [`CaptureSession`](crate::CaptureSession).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use crate::capture::{CaptureDevice, CaptureStream};
use crate::error::{Error, Result};
use crate::format::{AudioFormat, SampleEncoding};

/// Lists the names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().map_err(anyhow::Error::from)?;
    Ok(devices
        .filter_map(|device| device.name().ok())
        .collect())
}

/// A cpal input device.
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
}

impl CpalDevice {
    /// The host's default input device.
    pub fn default_input() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no default input device".into()))?;
        Self::from_device(device)
    }

    /// The first input device whose name matches exactly.
    pub fn by_name(name: &str) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .input_devices()
            .map_err(anyhow::Error::from)?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::DeviceUnavailable(format!("no input device named {name:?}")))?;
        Self::from_device(device)
    }

    fn from_device(device: cpal::Device) -> Result<Self> {
        let name = device.name().map_err(anyhow::Error::from)?;
        info!("[AUDIO] Using audio input device: {}", name);
        Ok(Self { device, name })
    }
}

impl CaptureDevice for CpalDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn supports(&self, format: &AudioFormat) -> bool {
        match self.device.supported_input_configs() {
            Ok(configs) => find_supported_config(configs.collect(), format).is_some(),
            Err(e) => {
                warn!("[AUDIO] Could not query input configs of {}: {}", self.name, e);
                false
            }
        }
    }

    fn preferred_format(&self) -> Result<AudioFormat> {
        let config = self
            .device
            .default_input_config()
            .map_err(anyhow::Error::from)?;
        Ok(AudioFormat::new(
            config.sample_rate().0,
            config.channels(),
            encoding_of(config.sample_format()),
        ))
    }

    fn open(&mut self, format: &AudioFormat) -> Result<Box<dyn CaptureStream>> {
        let sample_format = stream_sample_format(format.encoding, || {
            let config = self
                .device
                .default_input_config()
                .map_err(anyhow::Error::from)?;
            Ok(config.sample_format())
        })?;
        let stream = start_audio_capture(&self.device, format, sample_format)
            .map_err(|e| Error::StreamUnavailable(format!("{}: {e:#}", self.name)))?;
        Ok(Box::new(stream))
    }
}

/// A running cpal input stream and the receiving end of its byte channel.
pub struct CpalStream {
    stream: cpal::Stream,
    receiver: Receiver<Vec<u8>>,
}

impl CaptureStream for CpalStream {
    fn read_available(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for chunk in self.receiver.try_iter() {
            bytes.extend_from_slice(&chunk);
        }
        bytes
    }

    fn halt(&mut self) {
        if let Err(e) = self.stream.pause() {
            error!("[AUDIO] Error pausing stream: {}", e);
        }
        // Discard whatever the callback delivered before the pause took effect.
        let dropped = self.receiver.try_iter().count();
        debug!("[AUDIO] Stream halted, {} pending chunks discarded", dropped);
    }
}

/// Builds and starts a cpal input stream in `format`, capturing `sample_format`.
///
/// The data callback forwards each block's raw native-endian bytes over an
/// unbounded channel; the returned [`CpalStream`] owns the receiver. Sample
/// formats ingest cannot decode are still captured, and their chunks are
/// dropped by the session.
fn start_audio_capture(
    device: &cpal::Device,
    format: &AudioFormat,
    sample_format: SampleFormat,
) -> anyhow::Result<CpalStream> {
    let config = cpal::StreamConfig {
        channels: format.channel_count,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let (sender, receiver) = crossbeam_channel::unbounded::<Vec<u8>>();

    let err_fn = |err: cpal::StreamError| error!("[AUDIO] An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream_raw(
        &config,
        sample_format,
        move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
            // The receiver is gone once the session dropped the stream.
            let _ = sender.send(data.bytes().to_vec());
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    info!("[AUDIO] Capture stream running at {} ({:?})", format, sample_format);

    Ok(CpalStream { stream, receiver })
}

/// The cpal sample format to open a stream in.
///
/// Decodable encodings map directly; `Unknown` captures in the device's own
/// default sample format.
fn stream_sample_format<F>(encoding: SampleEncoding, device_default: F) -> Result<SampleFormat>
where
    F: FnOnce() -> Result<SampleFormat>,
{
    match sample_format_of(encoding) {
        Some(sample_format) => Ok(sample_format),
        None => device_default(),
    }
}

/// Maps a cpal sample format onto the encodings ingest can decode.
pub fn encoding_of(format: SampleFormat) -> SampleEncoding {
    match format {
        SampleFormat::I16 => SampleEncoding::Int16,
        SampleFormat::I32 => SampleEncoding::Int32,
        SampleFormat::F32 => SampleEncoding::Float32,
        SampleFormat::U8 => SampleEncoding::UInt8,
        _ => SampleEncoding::Unknown,
    }
}

fn sample_format_of(encoding: SampleEncoding) -> Option<SampleFormat> {
    match encoding {
        SampleEncoding::Int16 => Some(SampleFormat::I16),
        SampleEncoding::Int32 => Some(SampleFormat::I32),
        SampleEncoding::Float32 => Some(SampleFormat::F32),
        SampleEncoding::UInt8 => Some(SampleFormat::U8),
        SampleEncoding::Unknown => None,
    }
}

/// Finds a supported configuration range covering `format` exactly:
/// same channel count, same sample format, sample rate within range.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    format: &AudioFormat,
) -> Option<SupportedStreamConfigRange> {
    let sample_format = sample_format_of(format.encoding)?;
    configs.into_iter().find(|c| {
        c.channels() == format.channel_count
            && c.sample_format() == sample_format
            && c.min_sample_rate().0 <= format.sample_rate
            && format.sample_rate <= c.max_sample_rate().0
    })
}
