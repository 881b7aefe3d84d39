//! Gapless lookahead scheduling.
//!
//! Chunks are placed back to back on the device clock. The first chunk after
//! a reset starts `lookahead` seconds in the future so jitter in arrival is
//! absorbed. If arrivals stall long enough that the next slot has slipped
//! more than `starvation_tolerance` into the past, scheduling restarts at
//! the current time rather than trying to catch up.

use std::time::Duration;

use crate::device::OutputDevice;
use crate::{AudioChunk, decode_base64_pcm16, decode_pcm16};

/// Where a chunk landed on the device clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSpan {
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl ScheduledSpan {
    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Scheduler timing and payload format.
///
/// ## Fields
///
/// - `lookahead`: delay before the first chunk after a reset (default 1.5 s)
/// - `starvation_tolerance`: allowed lag before the slot snaps to now (default 0.1 s)
/// - `fade`: fade-out length used by [`AudioScheduler::reset`] (default 0.1 s)
/// - `sample_rate` / `channels`: format of PCM16 payloads (default 48 kHz stereo)
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Delay before the first chunk after a reset.
    pub lookahead: Duration,
    /// Allowed lag before snapping back to the device clock.
    pub starvation_tolerance: Duration,
    /// Fade used when resetting.
    pub fade: Duration,
    /// Sample rate of incoming payloads.
    pub sample_rate: u32,
    /// Channel count of incoming payloads.
    pub channels: u16,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_millis(1500),
            starvation_tolerance: Duration::from_millis(100),
            fade: Duration::from_millis(100),
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Places chunks on an [`OutputDevice`] without gaps or overlaps.
pub struct AudioScheduler {
    device: Box<dyn OutputDevice>,
    config: SchedulerConfig,
    next_start: Option<f64>,
}

impl std::fmt::Debug for AudioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioScheduler")
            .field("config", &self.config)
            .field("next_start", &self.next_start)
            .finish_non_exhaustive()
    }
}

impl AudioScheduler {
    /// Take ownership of a device.
    pub fn new(device: Box<dyn OutputDevice>, config: SchedulerConfig) -> Self {
        Self {
            device,
            config,
            next_start: None,
        }
    }

    /// Scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Device clock in seconds.
    pub fn device_time(&self) -> f64 {
        self.device.current_time()
    }

    /// Whether a chunk has been scheduled since the last reset.
    pub fn is_primed(&self) -> bool {
        self.next_start.is_some()
    }

    /// Start time the next chunk would get, if primed.
    pub fn next_start_time(&self) -> Option<f64> {
        self.next_start
    }

    /// Seconds of audio scheduled beyond the device clock.
    pub fn buffered_ahead(&self) -> f64 {
        self.next_start
            .map_or(0.0, |t| (t - self.device.current_time()).max(0.0))
    }

    /// Schedule a chunk right after the previous one.
    pub fn enqueue(&mut self, chunk: AudioChunk) -> ScheduledSpan {
        let lookahead = self.config.lookahead;
        self.enqueue_with_lookahead(chunk, lookahead)
    }

    /// Like [`enqueue`](Self::enqueue), but a chunk that primes the timeline
    /// starts `lookahead` after the device clock instead of the configured
    /// delay.
    pub fn enqueue_with_lookahead(
        &mut self,
        chunk: AudioChunk,
        lookahead: Duration,
    ) -> ScheduledSpan {
        if !self.device.is_running()
            && let Err(e) = self.device.resume()
        {
            tracing::warn!(error = %e, "failed to resume output device");
        }

        let now = self.device.current_time();
        let tolerance = self.config.starvation_tolerance.as_secs_f64();
        let next = match self.next_start {
            None => now + lookahead.as_secs_f64(),
            Some(t) if t < now - tolerance => {
                tracing::debug!(behind_secs = now - t, "playback starved, restarting at now");
                now
            }
            Some(t) => t,
        };

        let span = ScheduledSpan {
            start: next.max(now),
            duration: chunk.duration(),
        };
        self.device.schedule(chunk, span.start);
        self.next_start = Some(span.end());
        tracing::trace!(start = span.start, duration = span.duration, "chunk scheduled");
        span
    }

    /// Decode a base64 PCM16 payload and schedule it.
    ///
    /// Malformed payloads are logged and dropped.
    pub fn enqueue_payload(&mut self, payload: &str) -> Option<ScheduledSpan> {
        match decode_base64_pcm16(payload, self.config.sample_rate, self.config.channels) {
            Ok(chunk) => Some(self.enqueue(chunk)),
            Err(e) => {
                tracing::warn!(error = %e, len = payload.len(), "dropping malformed audio payload");
                None
            }
        }
    }

    /// Decode raw PCM16 bytes and schedule them.
    ///
    /// Malformed payloads are logged and dropped.
    pub fn enqueue_pcm16(&mut self, bytes: &[u8]) -> Option<ScheduledSpan> {
        match decode_pcm16(bytes, self.config.sample_rate, self.config.channels) {
            Ok(chunk) => Some(self.enqueue(chunk)),
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "dropping malformed audio payload");
                None
            }
        }
    }

    /// Forget the schedule and fade out what is playing.
    pub fn reset(&mut self) {
        self.next_start = None;
        self.device.disconnect(self.config.fade.as_secs_f64());
    }

    /// Ramp the master gain.
    pub fn set_gain(&mut self, gain: f32, ramp: Duration) {
        self.device.set_gain(gain.clamp(0.0, 1.0), ramp.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualOutput;

    fn setup() -> (VirtualOutput, AudioScheduler) {
        let device = VirtualOutput::new(48000);
        let scheduler = AudioScheduler::new(Box::new(device.clone()), SchedulerConfig::default());
        (device, scheduler)
    }

    fn chunk(secs: f64) -> AudioChunk {
        let frames = (secs * 48000.0) as usize;
        AudioChunk::new(vec![0.0; frames * 2], 48000, 2)
    }

    #[test]
    fn first_chunk_waits_for_lookahead() {
        let (device, mut scheduler) = setup();
        device.set_time(10.0);
        assert!(!scheduler.is_primed());
        let span = scheduler.enqueue(chunk(0.5));
        assert_eq!(span.start, 11.5);
        assert!(scheduler.is_primed());
        assert_eq!(scheduler.next_start_time(), Some(12.0));
    }

    #[test]
    fn short_lookahead_primes_sooner() {
        let (device, mut scheduler) = setup();
        device.set_time(2.0);
        let first = scheduler.enqueue_with_lookahead(chunk(0.1), Duration::from_millis(100));
        assert!((first.start - 2.1).abs() < 1e-9);
        // Once primed, the lookahead no longer matters.
        let second = scheduler.enqueue(chunk(0.1));
        assert_eq!(second.start, first.end());
    }

    #[test]
    fn chunks_are_back_to_back() {
        let (device, mut scheduler) = setup();
        let a = scheduler.enqueue(chunk(0.5));
        device.advance(0.2);
        let b = scheduler.enqueue(chunk(0.25));
        assert_eq!(b.start, a.end());
        assert_eq!(scheduler.buffered_ahead(), 2.25 - 0.2);
    }

    #[test]
    fn small_lag_starts_now_without_snapping() {
        let (device, mut scheduler) = setup();
        scheduler.enqueue(chunk(0.5));
        device.set_time(2.05);
        let span = scheduler.enqueue(chunk(0.5));
        assert_eq!(span.start, 2.05);
    }

    #[test]
    fn starvation_snaps_to_now() {
        let (device, mut scheduler) = setup();
        scheduler.enqueue(chunk(0.5));
        device.set_time(5.0);
        let span = scheduler.enqueue(chunk(0.5));
        assert_eq!(span.start, 5.0);
        assert_eq!(scheduler.next_start_time(), Some(5.5));
    }

    #[test]
    fn reset_disconnects_with_fade_and_reprimes() {
        let (device, mut scheduler) = setup();
        scheduler.enqueue(chunk(0.5));
        scheduler.reset();
        assert!(!scheduler.is_primed());
        assert_eq!(device.disconnects(), [0.1]);
        device.set_time(3.0);
        assert_eq!(scheduler.enqueue(chunk(0.5)).start, 4.5);
    }

    #[test]
    fn suspended_device_is_resumed() {
        let (device, mut scheduler) = setup();
        device.suspend();
        scheduler.enqueue(chunk(0.1));
        assert_eq!(device.resume_count(), 1);
        scheduler.enqueue(chunk(0.1));
        assert_eq!(device.resume_count(), 1);
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let (device, mut scheduler) = setup();
        assert_eq!(scheduler.enqueue_payload("%%%"), None);
        assert_eq!(scheduler.enqueue_pcm16(&[1, 2, 3]), None);
        assert!(device.spans().is_empty());
        assert!(!scheduler.is_primed());
    }

    #[test]
    fn gain_is_clamped() {
        let (device, mut scheduler) = setup();
        scheduler.set_gain(3.0, Duration::from_millis(50));
        let changes = device.gain_changes();
        assert_eq!(changes[0].gain, 1.0);
        assert_eq!(changes[0].ramp_secs, 0.05);
    }
}
