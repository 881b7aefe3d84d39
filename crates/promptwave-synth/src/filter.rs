//! Two-pole state variable filter (trapezoidal integration).

use core::f32::consts::PI;
use libm::tanf;

/// Which response [`Svf::process`] returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Low-pass.
    #[default]
    Lowpass,
    /// Band-pass.
    Bandpass,
}

/// Topology-preserving state variable filter.
///
/// Stable under fast cutoff changes, which the fallback relies on when
/// brightness moves while notes are sounding.
#[derive(Clone, Debug)]
pub struct Svf {
    sample_rate: f32,
    cutoff: f32,
    q: f32,
    mode: FilterMode,
    g: f32,
    k: f32,
    s1: f32,
    s2: f32,
}

impl Svf {
    /// Create a filter. `q` of 0.707 is maximally flat.
    pub fn new(sample_rate: f32, mode: FilterMode, cutoff: f32, q: f32) -> Self {
        let mut svf = Self {
            sample_rate,
            cutoff,
            q: q.max(0.1),
            mode,
            g: 0.0,
            k: 0.0,
            s1: 0.0,
            s2: 0.0,
        };
        svf.set_cutoff(cutoff);
        svf
    }

    /// Set the cutoff in Hz, clamped to `[20, 0.45·fs]`.
    pub fn set_cutoff(&mut self, hz: f32) {
        self.cutoff = hz.clamp(20.0, self.sample_rate * 0.45);
        self.g = tanf(PI * self.cutoff / self.sample_rate);
        self.k = 1.0 / self.q;
    }

    /// Current cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Clear the integrator state.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let v1 = (self.g * (input - self.s2) + self.s1) / (1.0 + self.g * (self.g + self.k));
        let v2 = self.s2 + self.g * v1;
        self.s1 = 2.0 * v1 - self.s1;
        self.s2 = 2.0 * v2 - self.s2;
        if self.s1.abs() < 1.0e-20 {
            self.s1 = 0.0;
        }
        if self.s2.abs() < 1.0e-20 {
            self.s2 = 0.0;
        }
        match self.mode {
            FilterMode::Lowpass => v2,
            FilterMode::Bandpass => v1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oscillator::{Oscillator, Waveform};

    fn rms_through(svf: &mut Svf, hz: f32) -> f32 {
        let mut osc = Oscillator::new(48000.0);
        osc.set_waveform(Waveform::Sine);
        osc.set_frequency(hz);
        // settle
        for _ in 0..4800 {
            svf.process(osc.advance());
        }
        let mut acc = 0.0;
        for _ in 0..4800 {
            let y = svf.process(osc.advance());
            acc += y * y;
        }
        (acc / 4800.0).sqrt()
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut svf = Svf::new(48000.0, FilterMode::Lowpass, 500.0, 0.707);
        let low = rms_through(&mut svf, 100.0);
        svf.reset();
        let high = rms_through(&mut svf, 8000.0);
        assert!(low > 0.6, "passband rms {low}");
        assert!(high < 0.05, "stopband rms {high}");
    }

    #[test]
    fn cutoff_is_clamped() {
        let mut svf = Svf::new(48000.0, FilterMode::Lowpass, 1000.0, 0.707);
        svf.set_cutoff(1.0);
        assert_eq!(svf.cutoff(), 20.0);
        svf.set_cutoff(40000.0);
        assert_eq!(svf.cutoff(), 48000.0 * 0.45);
    }
}
