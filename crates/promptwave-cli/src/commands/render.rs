//! Offline render of the local fallback generator.

use std::path::{Path, PathBuf};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use promptwave_core::{FilteredPromptRegistry, ParameterSet};
use promptwave_io::{WavSpec, write_wav};
use promptwave_synth::{CHANNELS, FallbackSynthesizer};

use super::common::{ParamArgs, PromptArgs, load_config};

const BLOCK_FRAMES: usize = 4800;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    output: PathBuf,

    /// Length in seconds
    #[arg(short, long, default_value = "30")]
    duration: f32,

    /// Random seed for the arrangement
    #[arg(long, default_value = "1")]
    seed: u32,

    /// Sample rate (defaults to the configured rate)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Write 32-bit float instead of 16-bit PCM
    #[arg(long)]
    float: bool,

    #[command(flatten)]
    prompts: PromptArgs,

    #[command(flatten)]
    params: ParamArgs,
}

pub fn run(args: RenderArgs, config: Option<&Path>) -> anyhow::Result<()> {
    if !args.duration.is_finite() || args.duration <= 0.0 {
        anyhow::bail!("duration must be positive, got {}", args.duration);
    }
    let config = load_config(config)?;
    let sample_rate = args.sample_rate.unwrap_or(config.sample_rate);
    if sample_rate == 0 {
        anyhow::bail!("sample rate must be positive");
    }

    let (prompts, update) = args.prompts.resolve(&args.params)?;
    let parameters = ParameterSet::default().merge(&update).parameters;

    let mut synth = FallbackSynthesizer::new(sample_rate, args.seed);
    synth.set_parameters(&parameters);
    synth.set_prompts(&prompts.active(&FilteredPromptRegistry::new()));
    synth.play();

    let total_frames = (f64::from(args.duration) * f64::from(sample_rate)).round() as usize;
    println!(
        "Rendering {:.1}s at {} BPM ({} Hz) to {}",
        args.duration,
        parameters.tempo_bpm(),
        sample_rate,
        args.output.display()
    );

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let channels = usize::from(CHANNELS);
    let mut samples = vec![0.0f32; total_frames * channels];
    for block in samples.chunks_mut(BLOCK_FRAMES * channels) {
        synth.render(block);
        pb.inc((block.len() / channels) as u64);
    }
    pb.finish_and_clear();

    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: if args.float { 32 } else { 16 },
    };
    write_wav(&args.output, &samples, spec)?;

    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    println!(
        "Wrote {} frames ({} beats, peak {:.3})",
        total_frames,
        synth.beats_elapsed(),
        peak
    );
    Ok(())
}
