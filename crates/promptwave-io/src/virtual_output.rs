//! In-memory output device with a manually driven clock.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::OutputDevice;
use crate::scheduler::ScheduledSpan;
use crate::{AudioChunk, Result};

/// A recorded gain request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainChange {
    /// Target gain.
    pub gain: f32,
    /// Ramp length in seconds.
    pub ramp_secs: f64,
    /// Device time of the request.
    pub at: f64,
}

#[derive(Debug, Default)]
struct State {
    now: f64,
    running: bool,
    spans: Vec<ScheduledSpan>,
    frames: usize,
    gains: Vec<GainChange>,
    disconnects: Vec<f64>,
    resumes: usize,
}

/// Headless device for tests and offline runs.
///
/// Cloning yields another handle to the same device, so a test can keep one
/// handle while the scheduler owns the other.
#[derive(Debug, Clone)]
pub struct VirtualOutput {
    sample_rate: u32,
    state: Arc<Mutex<State>>,
}

impl VirtualOutput {
    /// New running device at time zero.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(State {
                running: true,
                ..State::default()
            })),
        }
    }

    /// Set the clock.
    pub fn set_time(&self, secs: f64) {
        self.state.lock().now = secs;
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: f64) {
        self.state.lock().now += secs;
    }

    /// Mark the device suspended until the next [`OutputDevice::resume`].
    pub fn suspend(&self) {
        self.state.lock().running = false;
    }

    /// Every span scheduled so far, in order.
    pub fn spans(&self) -> Vec<ScheduledSpan> {
        self.state.lock().spans.clone()
    }

    /// Total frames scheduled.
    pub fn scheduled_frames(&self) -> usize {
        self.state.lock().frames
    }

    /// Every gain request so far.
    pub fn gain_changes(&self) -> Vec<GainChange> {
        self.state.lock().gains.clone()
    }

    /// Fade lengths of every disconnect so far.
    pub fn disconnects(&self) -> Vec<f64> {
        self.state.lock().disconnects.clone()
    }

    /// How many times the device was resumed.
    pub fn resume_count(&self) -> usize {
        self.state.lock().resumes
    }

    /// Forget recorded history, keeping the clock.
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.spans.clear();
        state.frames = 0;
        state.gains.clear();
        state.disconnects.clear();
        state.resumes = 0;
    }
}

impl OutputDevice for VirtualOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.running = true;
        state.resumes += 1;
        Ok(())
    }

    fn schedule(&mut self, chunk: AudioChunk, start_time: f64) {
        let mut state = self.state.lock();
        state.frames += chunk.frames();
        state.spans.push(ScheduledSpan {
            start: start_time,
            duration: chunk.duration(),
        });
    }

    fn set_gain(&mut self, gain: f32, ramp_secs: f64) {
        let mut state = self.state.lock();
        let at = state.now;
        state.gains.push(GainChange {
            gain,
            ramp_secs,
            at,
        });
    }

    fn disconnect(&mut self, fade_secs: f64) {
        self.state.lock().disconnects.push(fade_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let device = VirtualOutput::new(48000);
        let mut handle = device.clone();
        handle.schedule(AudioChunk::new(vec![0.0; 480], 48000, 2), 0.25);
        device.advance(0.5);
        assert_eq!(handle.current_time(), 0.5);
        assert_eq!(device.spans()[0].start, 0.25);
        assert_eq!(device.scheduled_frames(), 240);
    }

    #[test]
    fn suspend_and_resume() {
        let device = VirtualOutput::new(48000);
        device.suspend();
        let mut handle = device.clone();
        assert!(!handle.is_running());
        handle.resume().unwrap();
        assert!(device.is_running());
        assert_eq!(device.resume_count(), 1);
    }
}
