//! # Sample Ingest Module
//!
//! Converts raw interleaved PCM bytes, as read from a capture stream, into
//! normalised mono `f32` samples in [-1, 1] by averaging all channels of
//! each frame.
//!
//! Bytes are interpreted in native byte order, which is what capture
//! backends hand out. A trailing partial frame is ignored.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{Error, Result};
use crate::fifo::SampleFifo;
use crate::format::{AudioFormat, SampleEncoding};

const I16_SCALE: f32 = 32768.0;
const I32_SCALE: f32 = 2_147_483_648.0; // 2^31
const U8_CENTER: f32 = 128.0;

/// Decodes one chunk of PCM bytes into mono samples.
///
/// Output length is `floor(bytes / (bytes_per_sample * channels))`.
///
/// # Errors
/// * `Error::UnsupportedEncoding` - the format's encoding is `Unknown`
pub fn decode_chunk(bytes: &[u8], format: &AudioFormat) -> Result<Vec<f32>> {
    let channels = format.channel_count.max(1) as usize;

    let samples = match format.encoding {
        SampleEncoding::Int16 => downmix(bytes, channels, 2, |b| {
            NativeEndian::read_i16(b) as f32 / I16_SCALE
        }),
        SampleEncoding::Int32 => downmix(bytes, channels, 4, |b| {
            NativeEndian::read_i32(b) as f32 / I32_SCALE
        }),
        SampleEncoding::Float32 => downmix(bytes, channels, 4, |b| {
            finite_or_zero(NativeEndian::read_f32(b)).clamp(-1.0, 1.0)
        }),
        SampleEncoding::UInt8 => downmix(bytes, channels, 1, |b| {
            (b[0] as f32 - U8_CENTER) / U8_CENTER
        }),
        SampleEncoding::Unknown => return Err(Error::UnsupportedEncoding(format.encoding)),
    };

    Ok(samples)
}

/// Decodes a chunk and appends it to the FIFO, which trims itself to its bound.
///
/// Returns the number of mono samples appended.
pub fn ingest(bytes: &[u8], format: &AudioFormat, fifo: &mut SampleFifo) -> Result<usize> {
    let samples = decode_chunk(bytes, format)?;
    let count = samples.len();
    fifo.extend(samples);
    Ok(count)
}

/// NaN and infinities decode as silence; `clamp` would let NaN through.
fn finite_or_zero(sample: f32) -> f32 {
    if sample.is_finite() { sample } else { 0.0 }
}

/// Averages each interleaved frame down to one sample.
fn downmix<F>(bytes: &[u8], channels: usize, width: usize, decode: F) -> Vec<f32>
where
    F: Fn(&[u8]) -> f32,
{
    bytes
        .chunks_exact(width * channels)
        .map(|frame| {
            let sum: f32 = frame.chunks_exact(width).map(&decode).sum();
            sum / channels as f32
        })
        .collect()
}
