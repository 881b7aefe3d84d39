//! Band-limited oscillators.
//!
//! Saw and square use a 2-sample polynomial band-limited step (PolyBLEP)
//! correction at each discontinuity. Triangle is derived from a leaky
//! integration of the corrected square. Noise is a 32-bit xorshift.

use core::f32::consts::TAU;
use libm::sinf;

/// Oscillator waveform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sine.
    #[default]
    Sine,
    /// Triangle.
    Triangle,
    /// Rising sawtooth.
    Saw,
    /// 50% square.
    Square,
    /// White noise.
    Noise,
}

/// Two-sample PolyBLEP residual for a step at phase 0.
///
/// `t` is the normalized phase in `[0, 1)`, `dt` the phase increment.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// 32-bit xorshift generator.
///
/// Also used by the sequencer for trigger decisions, so it lives here
/// rather than inside [`Oscillator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XorShift {
    state: u32,
}

impl XorShift {
    /// Seed the generator. A zero seed is replaced with a fixed constant.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Next raw value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform value in `[-1, 1)`.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_unit() * 2.0 - 1.0
    }

    /// Uniform integer in `[low, high]`.
    pub fn range_i32(&mut self, low: i32, high: i32) -> i32 {
        if high <= low {
            return low;
        }
        let span = (high - low + 1) as u32;
        low + (self.next_u32() % span) as i32
    }
}

/// Audio-rate oscillator.
///
/// # Example
///
/// ```rust
/// use promptwave_synth::{Oscillator, Waveform};
///
/// let mut osc = Oscillator::new(48000.0);
/// osc.set_waveform(Waveform::Saw);
/// osc.set_frequency(110.0);
/// let s = osc.advance();
/// assert!(s.abs() <= 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct Oscillator {
    sample_rate: f32,
    frequency: f32,
    phase: f32,
    increment: f32,
    waveform: Waveform,
    integrator: f32,
    noise: XorShift,
}

impl Oscillator {
    /// Create a sine oscillator at 440 Hz.
    pub fn new(sample_rate: f32) -> Self {
        let mut osc = Self {
            sample_rate,
            frequency: 440.0,
            phase: 0.0,
            increment: 0.0,
            waveform: Waveform::Sine,
            integrator: 0.0,
            noise: XorShift::new(0x1234_5678),
        };
        osc.set_frequency(440.0);
        osc
    }

    /// Set frequency in Hz. Clamped below Nyquist.
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz.clamp(0.0, self.sample_rate * 0.49);
        self.increment = self.frequency / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Select the waveform.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Reseed the noise source.
    pub fn set_seed(&mut self, seed: u32) {
        self.noise = XorShift::new(seed);
    }

    /// Rewind phase and clear the triangle integrator.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.integrator = 0.0;
    }

    /// Produce the next sample in `[-1, 1]`.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let t = self.phase;
        let dt = self.increment;

        let out = match self.waveform {
            Waveform::Sine => sinf(t * TAU),
            Waveform::Saw => 2.0 * t - 1.0 - poly_blep(t, dt),
            Waveform::Square => self.square(t, dt),
            Waveform::Triangle => {
                let sq = self.square(t, dt);
                // Leaky integrator keeps DC from accumulating.
                self.integrator = dt * 4.0 * sq + (1.0 - dt) * self.integrator;
                self.integrator.clamp(-1.0, 1.0)
            }
            Waveform::Noise => self.noise.next_bipolar(),
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    #[inline]
    fn square(&self, t: f32, dt: f32) -> f32 {
        let naive = if t < 0.5 { 1.0 } else { -1.0 };
        let mut falling = t + 0.5;
        if falling >= 1.0 {
            falling -= 1.0;
        }
        naive + poly_blep(t, dt) - poly_blep(falling, dt)
    }
}
