//! # Capture Device Module
//!
//! The seam between the tracker and whatever delivers microphone bytes.
//! A [`CaptureDevice`] negotiates formats and opens streams; a
//! [`CaptureStream`] hands out the bytes captured since the last read.

#[cfg(test)]
use mockall::automock;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::format::AudioFormat;

/// An open capture stream.
#[cfg_attr(test, automock)]
pub trait CaptureStream {
    /// Returns all interleaved PCM bytes captured since the last call.
    ///
    /// Never blocks; an empty vector means nothing new arrived.
    fn read_available(&mut self) -> Vec<u8>;

    /// Stops delivering data. Further reads return nothing.
    fn halt(&mut self);
}

/// A source of capture streams, e.g. a microphone.
#[cfg_attr(test, automock)]
pub trait CaptureDevice {
    fn name(&self) -> String;

    /// Whether the device can capture in exactly this format.
    fn supports(&self, format: &AudioFormat) -> bool;

    /// The device's own preferred format.
    fn preferred_format(&self) -> Result<AudioFormat>;

    /// Opens a fresh stream in `format`.
    fn open(&mut self, format: &AudioFormat) -> Result<Box<dyn CaptureStream>>;
}

/// Chooses the format to capture in.
///
/// The wanted format is used when the device supports it; otherwise the
/// device's preferred format is adopted, sample rate and channel count
/// included.
pub fn negotiate_format<D>(device: &D, wanted: AudioFormat) -> Result<AudioFormat>
where
    D: CaptureDevice + ?Sized,
{
    if device.supports(&wanted) {
        return Ok(wanted);
    }

    let preferred = device.preferred_format().map_err(|e| {
        Error::FormatNegotiation(format!(
            "{} does not support {} and has no preferred format: {}",
            device.name(),
            wanted,
            e
        ))
    })?;

    info!(
        "[CAPTURE] {} does not support {}, falling back to {}",
        device.name(),
        wanted,
        preferred
    );
    if !preferred.encoding.is_supported() {
        warn!(
            "[CAPTURE] Preferred format of {} has an unsupported encoding; captured audio will be dropped",
            device.name()
        );
    }
    Ok(preferred)
}
