//! # Audio Format Module
//!
//! Describes the PCM layout a capture stream delivers. A format is fixed for
//! the lifetime of a capture session and only renegotiated on restart.

use std::fmt;

/// Sample encodings a capture device may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// 32-bit IEEE float in [-1, 1].
    Float32,
    /// Unsigned 8-bit integer centred on 128.
    UInt8,
    /// Anything else the device reports. Chunks in this encoding are dropped.
    Unknown,
}

impl SampleEncoding {
    /// Size of one sample in bytes, or `None` for [`SampleEncoding::Unknown`].
    pub fn bytes_per_sample(self) -> Option<usize> {
        match self {
            SampleEncoding::Int16 => Some(2),
            SampleEncoding::Int32 => Some(4),
            SampleEncoding::Float32 => Some(4),
            SampleEncoding::UInt8 => Some(1),
            SampleEncoding::Unknown => None,
        }
    }

    pub fn is_supported(self) -> bool {
        self.bytes_per_sample().is_some()
    }
}

/// The negotiated PCM format of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Frames per second. Always > 0.
    pub sample_rate: u32,
    /// Interleaved channels per frame. Always >= 1.
    pub channel_count: u16,
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channel_count: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channel_count: channel_count.max(1),
            encoding,
        }
    }

    /// The format requested from a device first: mono, 16-bit, at `sample_rate`.
    pub fn mono_i16(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1, SampleEncoding::Int16)
    }

    /// Bytes occupied by one interleaved frame, `None` if the encoding is unknown.
    pub fn bytes_per_frame(&self) -> Option<usize> {
        self.encoding
            .bytes_per_sample()
            .map(|bytes| bytes * self.channel_count as usize)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {:?}",
            self.sample_rate, self.channel_count, self.encoding
        )
    }
}
