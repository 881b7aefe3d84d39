//! Audio output layer for promptwave.
//!
//! This crate provides:
//!
//! - **Chunks**: [`AudioChunk`] and the PCM16 payload decoders used for
//!   remote audio
//! - **Devices**: the [`OutputDevice`] trait, the cpal-backed [`CpalOutput`]
//!   and the in-memory [`VirtualOutput`]
//! - **Scheduling**: [`AudioScheduler`], which places chunks back to back on a
//!   device behind a lookahead buffer
//! - **WAV files**: [`write_wav`] and [`read_wav_info`] for offline renders
//!
//! ## Quick Start
//!
//! ```rust
//! use promptwave_io::{AudioChunk, AudioScheduler, SchedulerConfig, VirtualOutput};
//!
//! let device = VirtualOutput::new(48000);
//! let mut scheduler = AudioScheduler::new(Box::new(device.clone()), SchedulerConfig::default());
//!
//! let chunk = AudioChunk::new(vec![0.0; 9600], 48000, 2);
//! let span = scheduler.enqueue(chunk);
//! assert_eq!(span.start, 1.5);
//! assert_eq!(device.spans().len(), 1);
//! ```

mod chunk;
mod cpal_output;
mod device;
mod scheduler;
mod timeline;
mod virtual_output;
mod wav;

pub use chunk::{AudioChunk, PCM16_BYTES_PER_SAMPLE, decode_base64_pcm16, decode_pcm16};
pub use cpal_output::{CpalOutput, OutputConfig, list_output_devices};
pub use device::{DeviceInfo, OutputDevice};
pub use scheduler::{AudioScheduler, ScheduledSpan, SchedulerConfig};
pub use virtual_output::{GainChange, VirtualOutput};
pub use wav::{WavInfo, WavSpec, read_wav_info, write_wav};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A payload was not valid base64.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A payload decoded to no samples.
    #[error("Empty audio payload")]
    EmptyPayload,

    /// A payload did not contain a whole number of frames.
    #[error("Partial frame: {len} bytes is not a multiple of {frame_bytes}")]
    PartialFrame {
        /// Payload length in bytes.
        len: usize,
        /// Bytes per interleaved frame.
        frame_bytes: usize,
    },

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
