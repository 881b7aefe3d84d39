//! Exponential ADSR envelope.
//!
//! Each stage approaches its target with a one-pole coefficient
//! `exp(-1 / samples)`. The attack aims past 1.0 so it reaches full level in
//! finite time. A sustain of zero turns the envelope into a one-shot
//! attack/decay suitable for percussion.

use libm::expf;

const ATTACK_OVERSHOOT: f32 = 1.2;
const SILENCE: f32 = 1.0e-4;

/// Envelope stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    /// Not sounding.
    #[default]
    Idle,
    /// Rising toward full level.
    Attack,
    /// Falling toward the sustain level.
    Decay,
    /// Holding.
    Sustain,
    /// Falling toward silence after gate off.
    Release,
}

fn coefficient(ms: f32, sample_rate: f32) -> f32 {
    let samples = (ms * 0.001 * sample_rate).max(1.0);
    expf(-1.0 / samples)
}

/// ADSR envelope generator.
///
/// ```rust
/// use promptwave_synth::{Envelope, Stage};
///
/// let mut env = Envelope::new(48000.0, 2.0, 80.0, 0.0, 50.0);
/// env.gate_on();
/// assert_eq!(env.stage(), Stage::Attack);
/// let _ = env.advance();
/// ```
#[derive(Clone, Debug)]
pub struct Envelope {
    sample_rate: f32,
    attack_ms: f32,
    decay_ms: f32,
    release_ms: f32,
    sustain: f32,
    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
    level: f32,
    stage: Stage,
}

impl Envelope {
    /// Create an envelope with the given stage times and sustain level.
    pub fn new(sample_rate: f32, attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) -> Self {
        Self {
            sample_rate,
            attack_ms,
            decay_ms,
            release_ms,
            sustain: sustain.clamp(0.0, 1.0),
            attack_coeff: coefficient(attack_ms, sample_rate),
            decay_coeff: coefficient(decay_ms, sample_rate),
            release_coeff: coefficient(release_ms, sample_rate),
            level: 0.0,
            stage: Stage::Idle,
        }
    }

    /// Change the decay time.
    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay_ms = ms;
        self.decay_coeff = coefficient(ms, self.sample_rate);
    }

    /// Change the release time.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms;
        self.release_coeff = coefficient(ms, self.sample_rate);
    }

    /// Attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Decay time in milliseconds.
    pub fn decay_ms(&self) -> f32 {
        self.decay_ms
    }

    /// Release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current output level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Whether the envelope produces output.
    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Start (or retrigger) from the current level.
    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
    }

    /// Enter release.
    pub fn gate_off(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    /// Silence immediately.
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.stage = Stage::Idle;
    }

    /// Next envelope value in `[0, 1]`.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => {}
            Stage::Attack => {
                self.level =
                    ATTACK_OVERSHOOT + (self.level - ATTACK_OVERSHOOT) * self.attack_coeff;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level = self.sustain + (self.level - self.sustain) * self.decay_coeff;
                if self.sustain <= 0.0 {
                    if self.level < SILENCE {
                        self.reset();
                    }
                } else if self.level - self.sustain < SILENCE {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = self.sustain,
            Stage::Release => {
                self.level *= self.release_coeff;
                if self.level < SILENCE {
                    self.reset();
                }
            }
        }
        self.level
    }
}
