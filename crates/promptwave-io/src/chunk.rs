//! Decoded audio buffers.

use base64::{Engine as _, engine::general_purpose};

use crate::{Error, Result};

/// Bytes per PCM16 sample.
pub const PCM16_BYTES_PER_SAMPLE: usize = 2;

/// A block of interleaved `f32` audio ready to schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioChunk {
    /// Wrap interleaved samples.
    ///
    /// A trailing partial frame is discarded. `channels` of zero is treated
    /// as mono.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Take the interleaved samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Whether the chunk holds no frames.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode interleaved little-endian PCM16 bytes.
///
/// Fails on empty input and on byte counts that do not form whole frames.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioChunk> {
    if bytes.is_empty() {
        return Err(Error::EmptyPayload);
    }
    let frame_bytes = PCM16_BYTES_PER_SAMPLE * usize::from(channels.max(1));
    if bytes.len() % frame_bytes != 0 {
        return Err(Error::PartialFrame {
            len: bytes.len(),
            frame_bytes,
        });
    }

    let samples = bytes
        .chunks_exact(PCM16_BYTES_PER_SAMPLE)
        .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
        .collect();
    Ok(AudioChunk::new(samples, sample_rate, channels))
}

/// Decode a base64 string of interleaved little-endian PCM16.
pub fn decode_base64_pcm16(payload: &str, sample_rate: u32, channels: u16) -> Result<AudioChunk> {
    let bytes = general_purpose::STANDARD.decode(payload.trim())?;
    decode_pcm16(&bytes, sample_rate, channels)
}
