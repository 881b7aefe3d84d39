//! Integration tests for the fallback synthesizer.
//!
//! These exercise the musical contract through the public API: beat timing
//! after tempo changes, density and brightness reactions, and determinism.

use promptwave_core::{ParameterSet, ParameterUpdate, Prompt};
use promptwave_synth::FallbackSynthesizer;

const SR: u32 = 48000;

fn with(update: ParameterUpdate) -> ParameterSet {
    ParameterSet::default().merge(&update).parameters
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn tempo_change_restarts_clock_with_half_second_beats() {
    let mut synth = FallbackSynthesizer::new(SR, 11);
    synth.set_parameters(&with(ParameterUpdate::tempo(90.0)));
    synth.play();
    synth.render_chunk(30_000);
    assert!(synth.beats_elapsed() > 0);

    synth.set_parameters(&with(ParameterUpdate::tempo(120.0)));
    assert_eq!(synth.clock_position(), 0);
    assert_eq!(synth.beats_elapsed(), 0);
    assert_eq!(synth.samples_per_beat(), 24_000.0);

    // Beat one fires on the very first frame after the restart.
    synth.render_chunk(1);
    assert_eq!(synth.beats_elapsed(), 1);

    // The next beat lands exactly 0.5 s later.
    synth.render_chunk(23_999);
    assert_eq!(synth.beats_elapsed(), 1);
    synth.render_chunk(1);
    assert_eq!(synth.beats_elapsed(), 2);

    synth.render_chunk(24_000);
    assert_eq!(synth.beats_elapsed(), 3);
}

#[test]
fn kick_onset_is_audible_on_the_downbeat() {
    let mut synth = FallbackSynthesizer::new(SR, 5);
    synth.set_parameters(&with(ParameterUpdate {
        density: Some(0.0),
        brightness: Some(0.0),
        ..Default::default()
    }));
    synth.play();
    let chunk = synth.render_chunk(2400);
    // First 50 ms carry the kick.
    assert!(rms(chunk.samples()) > 0.05);
}

// ============================================================================
// Parameter reactions
// ============================================================================

#[test]
fn density_scales_melody_activity() {
    let count = |density: f32| {
        let mut synth = FallbackSynthesizer::new(SR, 1234);
        synth.set_parameters(&with(ParameterUpdate {
            density: Some(density),
            ..Default::default()
        }));
        synth.play();
        // 32 bars at 120 bpm
        for _ in 0..64 {
            synth.render_chunk(SR as usize);
        }
        synth.melody_notes()
    };

    let sparse = count(0.0);
    let dense = count(1.0);
    // 256 eighth steps: expected ~13 at density 0, ~166 at density 1.
    assert!(sparse < 40, "sparse = {sparse}");
    assert!(dense > 120, "dense = {dense}");
}

#[test]
fn brightness_moves_noise_cutoff() {
    let mut synth = FallbackSynthesizer::new(SR, 1);
    for (b, expected) in [(0.0, 100.0), (0.5, 1000.0), (1.0, 10_000.0)] {
        synth.set_parameters(&with(ParameterUpdate {
            brightness: Some(b),
            ..Default::default()
        }));
        let got = synth.noise_cutoff_hz();
        assert!((got - expected).abs() / expected < 1e-3, "{b} -> {got}");
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn output_is_deterministic_for_a_seed() {
    let render = |seed: u32| {
        let mut synth = FallbackSynthesizer::new(SR, seed);
        synth.set_prompts(&[Prompt::new("dub techno", 1.0).unwrap()]);
        synth.play();
        synth.render_chunk(9600).into_samples()
    };
    assert_eq!(render(9), render(9));
    assert_ne!(render(9), render(10));
}

#[test]
fn stop_then_play_starts_from_beat_one() {
    let mut synth = FallbackSynthesizer::new(SR, 2);
    synth.play();
    synth.render_chunk(50_000);
    synth.stop();
    assert!(synth.render_chunk(100).samples().iter().all(|s| *s == 0.0));

    synth.play();
    synth.render_chunk(1);
    assert_eq!(synth.beats_elapsed(), 1);
}
