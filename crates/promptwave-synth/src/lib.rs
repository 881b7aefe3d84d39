//! Promptwave Synth - the local fallback generator
//!
//! When the remote generative-audio service is unreachable, promptwave keeps
//! the music going with [`FallbackSynthesizer`]: a small algorithmic band
//! that reacts to the same parameters the remote service accepts.
//!
//! # Components
//!
//! - [`Oscillator`] / [`Waveform`] - PolyBLEP oscillators and xorshift noise
//! - [`Envelope`] - exponential ADSR, also used one-shot for percussion
//! - [`Svf`] - trapezoidal state variable filter
//! - [`MusicalClock`] - sample-accurate eighth-note grid
//! - [`PROGRESSIONS`] - the harmonic library
//! - [`Kick`] / [`Snare`] - the drum voices
//!
//! # Parameter mapping
//!
//! | parameter | effect |
//! |---|---|
//! | tempo | `samples_per_beat = sample_rate * 60 / bpm`, clock restarts on change |
//! | density | melody probability `0.05 + 0.6 * density`, pad level |
//! | brightness | noise cutoff `100 * 100^b` Hz, pad cutoff `400 * 10^b` Hz |
//! | guidance | largest melodic leap `max(1, 6 - guidance)` scale steps |
//!
//! ```rust
//! use promptwave_core::{ParameterSet, ParameterUpdate};
//! use promptwave_synth::FallbackSynthesizer;
//!
//! let mut synth = FallbackSynthesizer::new(48000, 42);
//! let bright = ParameterSet::default()
//!     .merge(&ParameterUpdate { brightness: Some(1.0), ..Default::default() })
//!     .parameters;
//! synth.set_parameters(&bright);
//! synth.play();
//!
//! let mut block = vec![0.0f32; 2 * 480];
//! synth.render(&mut block);
//! ```

pub mod clock;
pub mod drums;
pub mod envelope;
pub mod filter;
pub mod oscillator;
pub mod progression;
pub mod synth;

pub use clock::{MusicalClock, Step, samples_per_beat};
pub use drums::{Kick, Snare};
pub use envelope::{Envelope, Stage};
pub use filter::{FilterMode, Svf};
pub use oscillator::{Oscillator, Waveform, XorShift};
pub use progression::{Chord, PROGRESSIONS, Quality, midi_to_hz, progression_for};
pub use synth::{
    CHANNELS, FallbackSynthesizer, max_leap, melody_probability, noise_cutoff_hz, pad_cutoff_hz,
};
