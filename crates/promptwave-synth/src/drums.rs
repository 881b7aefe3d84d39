//! Two-voice drum kit.

use crate::envelope::Envelope;
use crate::filter::{FilterMode, Svf};
use crate::oscillator::{Oscillator, Waveform};
use libm::expf;

/// Sine kick with a falling pitch sweep.
#[derive(Clone, Debug)]
pub struct Kick {
    osc: Oscillator,
    amp: Envelope,
    sweep: f32,
    sweep_coeff: f32,
}

impl Kick {
    const START_HZ: f32 = 150.0;
    const END_HZ: f32 = 45.0;

    /// New kick voice.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            osc: Oscillator::new(sample_rate),
            amp: Envelope::new(sample_rate, 0.5, 60.0, 0.0, 20.0),
            sweep: 0.0,
            sweep_coeff: expf(-1.0 / (0.04 * sample_rate)),
        }
    }

    /// Strike.
    pub fn trigger(&mut self) {
        self.osc.reset();
        self.sweep = 1.0;
        self.amp.gate_on();
    }

    /// Silence immediately.
    pub fn reset(&mut self) {
        self.amp.reset();
        self.sweep = 0.0;
    }

    /// Whether the kick is still sounding.
    pub fn is_active(&self) -> bool {
        self.amp.is_active()
    }

    /// Next sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if !self.amp.is_active() {
            return 0.0;
        }
        self.osc
            .set_frequency(Self::END_HZ + (Self::START_HZ - Self::END_HZ) * self.sweep);
        self.sweep *= self.sweep_coeff;
        self.osc.advance() * self.amp.advance()
    }
}

/// Band-passed noise burst with a short tonal body.
#[derive(Clone, Debug)]
pub struct Snare {
    noise: Oscillator,
    body: Oscillator,
    band: Svf,
    noise_env: Envelope,
    body_env: Envelope,
}

impl Snare {
    /// New snare voice.
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let mut noise = Oscillator::new(sample_rate);
        noise.set_waveform(Waveform::Noise);
        noise.set_seed(seed);
        let mut body = Oscillator::new(sample_rate);
        body.set_waveform(Waveform::Triangle);
        body.set_frequency(185.0);
        Self {
            noise,
            body,
            band: Svf::new(sample_rate, FilterMode::Bandpass, 1800.0, 0.9),
            noise_env: Envelope::new(sample_rate, 0.5, 45.0, 0.0, 20.0),
            body_env: Envelope::new(sample_rate, 0.5, 20.0, 0.0, 10.0),
        }
    }

    /// Strike.
    pub fn trigger(&mut self) {
        self.body.reset();
        self.noise_env.gate_on();
        self.body_env.gate_on();
    }

    /// Silence immediately.
    pub fn reset(&mut self) {
        self.noise_env.reset();
        self.body_env.reset();
        self.band.reset();
    }

    /// Whether the snare is still sounding.
    pub fn is_active(&self) -> bool {
        self.noise_env.is_active() || self.body_env.is_active()
    }

    /// Next sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        let rattle = self.band.process(self.noise.advance()) * self.noise_env.advance();
        let tone = self.body.advance() * self.body_env.advance();
        rattle * 1.6 + tone * 0.5
    }
}
