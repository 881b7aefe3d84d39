//! The output device abstraction.
//!
//! An [`OutputDevice`] owns an absolute clock (seconds since it was opened)
//! and plays chunks at absolute start times on that clock. Only the
//! [`AudioScheduler`](crate::AudioScheduler) talks to a device; everything
//! else goes through the scheduler.
//!
//! ```text
//! AudioScheduler ──schedule/gain/disconnect──▶ OutputDevice
//!                                               ├── CpalOutput    (speakers)
//!                                               └── VirtualOutput (tests, headless)
//! ```

use crate::{AudioChunk, Result};

/// A playback target with its own clock.
pub trait OutputDevice: Send {
    /// Sample rate the device plays at.
    fn sample_rate(&self) -> u32;

    /// Device clock in seconds.
    fn current_time(&self) -> f64;

    /// Whether the clock is advancing.
    fn is_running(&self) -> bool;

    /// Resume a suspended device.
    fn resume(&mut self) -> Result<()>;

    /// Play `chunk` starting at `start_time` on the device clock.
    fn schedule(&mut self, chunk: AudioChunk, start_time: f64);

    /// Move the master gain to `gain` over `ramp_secs`.
    fn set_gain(&mut self, gain: f32, ramp_secs: f64);

    /// Fade out whatever is sounding over `fade_secs` and drop anything not
    /// yet started.
    fn disconnect(&mut self, fade_secs: f64);
}

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
    /// Whether this is the host's default output.
    pub is_default: bool,
}
