//! The fallback synthesizer.

use libm::{powf, roundf, tanhf};
use promptwave_core::{ParameterSet, Prompt};
use promptwave_io::AudioChunk;

use crate::clock::{MusicalClock, STEPS_PER_BAR, Step};
use crate::drums::{Kick, Snare};
use crate::envelope::Envelope;
use crate::filter::{FilterMode, Svf};
use crate::oscillator::{Oscillator, Waveform, XorShift};
use crate::progression::{Chord, PROGRESSIONS, midi_to_hz, progression_for};

/// Output channels rendered by [`FallbackSynthesizer`].
pub const CHANNELS: u16 = 2;

const MAX_DEGREE: i32 = 9;
const PAD_VOICES: usize = 3;

/// Noise-floor cutoff for a brightness in `[0, 1]`: `100 · 100^brightness` Hz.
///
/// ```rust
/// use promptwave_synth::noise_cutoff_hz;
///
/// assert!((noise_cutoff_hz(0.5) - 1000.0).abs() < 0.01);
/// ```
pub fn noise_cutoff_hz(brightness: f32) -> f32 {
    100.0 * powf(100.0, brightness.clamp(0.0, 1.0))
}

/// Pad filter cutoff for a brightness in `[0, 1]`: `400 · 10^brightness` Hz.
pub fn pad_cutoff_hz(brightness: f32) -> f32 {
    400.0 * powf(10.0, brightness.clamp(0.0, 1.0))
}

/// Melody trigger probability per eighth step: `0.05 + 0.6 · density`.
pub fn melody_probability(density: f32) -> f32 {
    0.05 + 0.6 * density.clamp(0.0, 1.0)
}

/// Largest scale-step leap for a guidance value: `max(1, 6 - guidance)`.
pub fn max_leap(guidance: f32) -> i32 {
    roundf(6.0 - guidance).max(1.0) as i32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Stopped,
    Playing,
    Paused,
}

/// Local generator used when the remote service is unavailable.
///
/// A drum pattern (kick on beats 1 and 3, snare on 2 and 4), a pad following
/// a four-bar progression, a sparse pentatonic lead on eighth-note steps and
/// a low-passed noise floor. Output is deterministic for a given seed.
///
/// # Example
///
/// ```rust
/// use promptwave_synth::FallbackSynthesizer;
///
/// let mut synth = FallbackSynthesizer::new(48000, 7);
/// synth.play();
/// let chunk = synth.render_chunk(4800);
/// assert_eq!(chunk.frames(), 4800);
/// assert!((chunk.duration() - 0.1).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct FallbackSynthesizer {
    sample_rate: u32,
    transport: Transport,
    clock: MusicalClock,
    rng: XorShift,

    kick: Kick,
    snare: Snare,

    pads: [Oscillator; PAD_VOICES],
    pad_env: Envelope,
    pad_filter: Svf,

    lead: Oscillator,
    lead_env: Envelope,
    lead_degree: i32,

    noise: Oscillator,
    noise_filter: Svf,

    progression: usize,
    chord: Chord,

    tempo_bpm: f32,
    guidance: f32,
    density: f32,
    brightness: f32,

    beats: u64,
    melody_notes: u64,
}

impl FallbackSynthesizer {
    /// Create a stopped synthesizer with default parameters.
    pub fn new(sample_rate: u32, seed: u32) -> Self {
        let sr = sample_rate as f32;
        let defaults = ParameterSet::default();

        let pads = core::array::from_fn(|_| {
            let mut osc = Oscillator::new(sr);
            osc.set_waveform(Waveform::Saw);
            osc
        });
        let mut lead = Oscillator::new(sr);
        lead.set_waveform(Waveform::Triangle);
        let mut noise = Oscillator::new(sr);
        noise.set_waveform(Waveform::Noise);
        noise.set_seed(seed.rotate_left(7) ^ 0xA5A5_A5A5);

        let mut synth = Self {
            sample_rate,
            transport: Transport::Stopped,
            clock: MusicalClock::new(sr, defaults.tempo_bpm()),
            rng: XorShift::new(seed),
            kick: Kick::new(sr),
            snare: Snare::new(sr, seed.wrapping_add(0x51)),
            pads,
            pad_env: Envelope::new(sr, 250.0, 600.0, 0.7, 800.0),
            pad_filter: Svf::new(sr, FilterMode::Lowpass, 1000.0, 0.8),
            lead,
            lead_env: Envelope::new(sr, 4.0, 90.0, 0.0, 60.0),
            lead_degree: 2,
            noise,
            noise_filter: Svf::new(sr, FilterMode::Lowpass, 1000.0, 0.707),
            progression: 0,
            chord: PROGRESSIONS[0][0],
            tempo_bpm: defaults.tempo_bpm(),
            guidance: defaults.guidance(),
            density: defaults.density(),
            brightness: defaults.brightness(),
            beats: 0,
            melody_notes: 0,
        };
        synth.apply_brightness();
        synth
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start or resume.
    pub fn play(&mut self) {
        self.transport = Transport::Playing;
    }

    /// Silence output, keeping the clock position and voices.
    pub fn pause(&mut self) {
        if self.transport == Transport::Playing {
            self.transport = Transport::Paused;
        }
    }

    /// Stop, rewind the clock and silence every voice.
    pub fn stop(&mut self) {
        self.transport = Transport::Stopped;
        self.rewind();
    }

    /// Whether output is being produced.
    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    /// Change tempo. The clock restarts from beat one immediately.
    pub fn set_tempo(&mut self, bpm: f32) {
        if !bpm.is_finite() || bpm <= 0.0 {
            return;
        }
        self.tempo_bpm = bpm;
        self.clock.restart(bpm);
        self.rewind();
    }

    /// Apply a full parameter set. Tempo restarts the clock only if it changed.
    pub fn set_parameters(&mut self, params: &ParameterSet) {
        self.guidance = params.guidance();
        self.density = params.density();
        self.brightness = params.brightness();
        self.apply_brightness();
        if params.tempo_bpm() != self.tempo_bpm {
            self.set_tempo(params.tempo_bpm());
        }
    }

    /// Pick a progression from the heaviest prompt. Takes effect at the next bar.
    ///
    /// An empty slice keeps the current progression.
    pub fn set_prompts(&mut self, prompts: &[Prompt]) {
        let mut heaviest: Option<&Prompt> = None;
        for prompt in prompts {
            if heaviest.is_none_or(|h| prompt.weight() > h.weight()) {
                heaviest = Some(prompt);
            }
        }
        if let Some(prompt) = heaviest {
            self.progression = progression_for(prompt.text());
        }
    }

    /// Current tempo in bpm.
    pub fn tempo_bpm(&self) -> f32 {
        self.tempo_bpm
    }

    /// Samples per beat at the current tempo.
    pub fn samples_per_beat(&self) -> f64 {
        self.clock.samples_per_beat()
    }

    /// Samples rendered since the clock last restarted.
    pub fn clock_position(&self) -> u64 {
        self.clock.position()
    }

    /// Beats triggered since the clock last restarted.
    pub fn beats_elapsed(&self) -> u64 {
        self.beats
    }

    /// Melody notes triggered since the clock last restarted.
    pub fn melody_notes(&self) -> u64 {
        self.melody_notes
    }

    /// Index of the selected progression.
    pub fn progression_index(&self) -> usize {
        self.progression
    }

    /// Current noise-floor cutoff in Hz.
    pub fn noise_cutoff_hz(&self) -> f32 {
        noise_cutoff_hz(self.brightness)
    }

    /// Current pad filter cutoff in Hz.
    pub fn pad_cutoff_hz(&self) -> f32 {
        pad_cutoff_hz(self.brightness)
    }

    /// Current melody trigger probability.
    pub fn melody_probability(&self) -> f32 {
        melody_probability(self.density)
    }

    /// Current largest melodic leap in scale steps.
    pub fn max_leap(&self) -> i32 {
        max_leap(self.guidance)
    }

    /// Render interleaved stereo into `out`. Writes silence unless playing.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.transport != Transport::Playing {
            out.fill(0.0);
            return;
        }
        for frame in out.chunks_exact_mut(CHANNELS as usize) {
            let (l, r) = self.next_frame();
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Render `frames` frames into a new chunk.
    pub fn render_chunk(&mut self, frames: usize) -> AudioChunk {
        let mut samples = vec![0.0; frames * CHANNELS as usize];
        self.render(&mut samples);
        AudioChunk::new(samples, self.sample_rate, CHANNELS)
    }

    fn apply_brightness(&mut self) {
        self.noise_filter.set_cutoff(noise_cutoff_hz(self.brightness));
        self.pad_filter.set_cutoff(pad_cutoff_hz(self.brightness));
    }

    fn rewind(&mut self) {
        self.clock.rewind();
        self.kick.reset();
        self.snare.reset();
        self.pad_env.reset();
        self.lead_env.reset();
        self.pad_filter.reset();
        self.noise_filter.reset();
        self.beats = 0;
        self.melody_notes = 0;
    }

    fn on_step(&mut self, step: Step) {
        if step.in_bar() == 0 {
            let bar = (step.bar() % 4) as usize;
            self.chord = PROGRESSIONS[self.progression][bar];
            for (osc, note) in self.pads.iter_mut().zip(self.chord.notes()) {
                osc.set_frequency(midi_to_hz(note));
            }
            self.pad_env.gate_on();
        } else if step.in_bar() == STEPS_PER_BAR - 1 {
            self.pad_env.gate_off();
        }

        if step.is_beat() {
            self.beats += 1;
            match step.beat_in_bar() {
                0 | 2 => self.kick.trigger(),
                _ => self.snare.trigger(),
            }
        }

        if self.rng.next_unit() < self.melody_probability() {
            let leap = self.max_leap();
            self.lead_degree = (self.lead_degree + self.rng.range_i32(-leap, leap)).clamp(0, MAX_DEGREE);
            let note = self.chord.scale_note(self.lead_degree as u32);
            self.lead.set_frequency(midi_to_hz(note));
            self.lead_env.gate_on();
            self.melody_notes += 1;
        }
    }

    #[inline]
    fn next_frame(&mut self) -> (f32, f32) {
        if let Some(step) = self.clock.tick() {
            self.on_step(step);
        }

        let pad_raw: f32 = self.pads.iter_mut().map(Oscillator::advance).sum::<f32>() / PAD_VOICES as f32;
        let pad_level = 0.10 + 0.12 * self.density;
        let pad = self.pad_filter.process(pad_raw) * self.pad_env.advance() * pad_level;

        let lead = self.lead.advance() * self.lead_env.advance() * 0.22;
        let drums = self.kick.advance() * 0.7 + self.snare.advance() * 0.28;
        let floor = self.noise_filter.process(self.noise.advance()) * 0.03;

        let center = pad + drums + floor;
        (tanhf(center + lead * 0.8), tanhf(center + lead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptwave_core::ParameterUpdate;

    fn params(update: ParameterUpdate) -> ParameterSet {
        ParameterSet::default().merge(&update).parameters
    }

    #[test]
    fn silent_until_played() {
        let mut synth = FallbackSynthesizer::new(48000, 1);
        let mut buf = vec![1.0; 960];
        synth.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0));
        assert_eq!(synth.clock_position(), 0);
    }

    #[test]
    fn pause_keeps_position_stop_rewinds() {
        let mut synth = FallbackSynthesizer::new(48000, 1);
        synth.play();
        synth.render_chunk(1000);
        synth.pause();
        synth.render_chunk(1000);
        assert_eq!(synth.clock_position(), 1000);

        synth.play();
        synth.render_chunk(500);
        assert_eq!(synth.clock_position(), 1500);

        synth.stop();
        assert_eq!(synth.clock_position(), 0);
        assert!(!synth.is_playing());
    }

    #[test]
    fn brightness_mapping() {
        assert!((noise_cutoff_hz(0.0) - 100.0).abs() < 0.01);
        assert!((noise_cutoff_hz(0.5) - 1000.0).abs() < 0.01);
        assert!((noise_cutoff_hz(1.0) - 10000.0).abs() < 0.5);
        assert!((pad_cutoff_hz(1.0) - 4000.0).abs() < 0.1);
    }

    #[test]
    fn guidance_narrows_leaps() {
        assert_eq!(max_leap(0.0), 6);
        assert_eq!(max_leap(4.0), 2);
        assert_eq!(max_leap(6.0), 1);
    }

    #[test]
    fn same_tempo_does_not_restart() {
        let mut synth = FallbackSynthesizer::new(48000, 1);
        synth.play();
        synth.render_chunk(100);
        synth.set_parameters(&params(ParameterUpdate {
            density: Some(0.9),
            ..Default::default()
        }));
        assert_eq!(synth.clock_position(), 100);

        synth.set_parameters(&params(ParameterUpdate::tempo(90.0)));
        assert_eq!(synth.clock_position(), 0);
        assert_eq!(synth.tempo_bpm(), 90.0);
    }

    #[test]
    fn heaviest_prompt_picks_progression() {
        let mut synth = FallbackSynthesizer::new(48000, 1);
        let prompts = [
            Prompt::new("ambient drone", 0.2).unwrap(),
            Prompt::new("minimal techno", 1.5).unwrap(),
        ];
        synth.set_prompts(&prompts);
        assert_eq!(synth.progression_index(), progression_for("minimal techno"));

        synth.set_prompts(&[]);
        assert_eq!(synth.progression_index(), progression_for("minimal techno"));
    }

    #[test]
    fn render_chunk_shape() {
        let mut synth = FallbackSynthesizer::new(44100, 3);
        synth.play();
        let chunk = synth.render_chunk(441);
        assert_eq!(chunk.channels(), 2);
        assert_eq!(chunk.sample_rate(), 44100);
        assert_eq!(chunk.samples().len(), 882);
        assert!(chunk.samples().iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }
}
