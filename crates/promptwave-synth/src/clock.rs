//! Sample-accurate musical clock.
//!
//! Step boundaries are computed from the absolute sample position rather
//! than accumulated, so long renders never drift.

/// Eighth-note steps per beat.
pub const STEPS_PER_BEAT: u64 = 2;
/// Beats per bar.
pub const BEATS_PER_BAR: u64 = 4;
/// Eighth-note steps per bar.
pub const STEPS_PER_BAR: u64 = STEPS_PER_BEAT * BEATS_PER_BAR;

/// Samples per beat at the given rate and tempo.
///
/// ```rust
/// use promptwave_synth::samples_per_beat;
///
/// assert_eq!(samples_per_beat(48000.0, 120.0), 24000.0);
/// ```
pub fn samples_per_beat(sample_rate: f32, bpm: f32) -> f64 {
    f64::from(sample_rate) * 60.0 / f64::from(bpm.max(1.0))
}

/// A position on the eighth-note grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// Steps since the clock (re)started.
    pub index: u64,
}

impl Step {
    /// Step within the bar, `0..8`.
    pub fn in_bar(self) -> u64 {
        self.index % STEPS_PER_BAR
    }

    /// Bars since the clock started.
    pub fn bar(self) -> u64 {
        self.index / STEPS_PER_BAR
    }

    /// Whether the step falls on a beat rather than an off-beat eighth.
    pub fn is_beat(self) -> bool {
        self.index % STEPS_PER_BEAT == 0
    }

    /// Beat within the bar, `0..4`, for on-beat steps.
    pub fn beat_in_bar(self) -> u64 {
        self.in_bar() / STEPS_PER_BEAT
    }
}

/// Tempo-derived clock advanced one sample at a time.
#[derive(Clone, Debug)]
pub struct MusicalClock {
    sample_rate: f32,
    bpm: f32,
    step_len: f64,
    position: u64,
    next_step: u64,
}

impl MusicalClock {
    /// New clock positioned at zero.
    pub fn new(sample_rate: f32, bpm: f32) -> Self {
        Self {
            sample_rate,
            bpm,
            step_len: samples_per_beat(sample_rate, bpm) / STEPS_PER_BEAT as f64,
            position: 0,
            next_step: 0,
        }
    }

    /// Tempo in bpm.
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Samples elapsed since the last restart.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Samples per beat at the current tempo.
    pub fn samples_per_beat(&self) -> f64 {
        self.step_len * STEPS_PER_BEAT as f64
    }

    /// Change tempo and rewind to zero.
    pub fn restart(&mut self, bpm: f32) {
        *self = Self::new(self.sample_rate, bpm);
    }

    /// Rewind to zero at the current tempo.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.next_step = 0;
    }

    /// Advance one sample. Returns the step that begins at this sample, if any.
    #[inline]
    pub fn tick(&mut self) -> Option<Step> {
        let boundary = (self.next_step as f64 * self.step_len).round() as u64;
        let fired = if self.position >= boundary {
            let step = Step {
                index: self.next_step,
            };
            self.next_step += 1;
            Some(step)
        } else {
            None
        };
        self.position += 1;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_are_half_a_second_apart_at_120() {
        let mut clock = MusicalClock::new(48000.0, 120.0);
        let mut beat_positions = Vec::new();
        for _ in 0..96_000 {
            let pos = clock.position();
            if let Some(step) = clock.tick() {
                if step.is_beat() {
                    beat_positions.push(pos);
                }
            }
        }
        assert_eq!(beat_positions, [0, 24000, 48000, 72000]);
    }

    #[test]
    fn restart_rewinds() {
        let mut clock = MusicalClock::new(48000.0, 90.0);
        for _ in 0..1000 {
            clock.tick();
        }
        clock.restart(120.0);
        assert_eq!(clock.position(), 0);
        assert_eq!(clock.samples_per_beat(), 24000.0);
        assert_eq!(clock.tick(), Some(Step { index: 0 }));
    }

    #[test]
    fn step_grid_helpers() {
        let s = Step { index: 13 };
        assert_eq!(s.bar(), 1);
        assert_eq!(s.in_bar(), 5);
        assert!(!s.is_beat());
        assert_eq!(Step { index: 12 }.beat_in_bar(), 2);
    }

    #[test]
    fn no_drift_at_awkward_tempo() {
        // 48000 * 60 / 77 / 2 is not an integer
        let mut clock = MusicalClock::new(48000.0, 77.0);
        let mut steps = 0u64;
        let total = 48000 * 60;
        for _ in 0..total {
            if clock.tick().is_some() {
                steps += 1;
            }
        }
        // 77 beats per minute, two steps each
        assert_eq!(steps, 154);
    }
}
