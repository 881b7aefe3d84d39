//! Engine backed by the local synthesizer.

use async_trait::async_trait;
use promptwave_core::{ActiveEngine, ParameterSet, Prompt};
use promptwave_io::AudioChunk;
use promptwave_synth::FallbackSynthesizer;

use crate::Result;
use crate::engine::Engine;

/// Renders fixed-size blocks from a [`FallbackSynthesizer`].
///
/// All operations are infallible; the async [`Engine`] impl just forwards
/// to the inherent methods so the actor can call them from sync code too.
#[derive(Debug)]
pub struct FallbackEngine {
    synth: FallbackSynthesizer,
    block_frames: usize,
}

impl FallbackEngine {
    /// Create a stopped engine rendering `block_frames` per block.
    pub fn new(sample_rate: u32, block_frames: usize, seed: u32) -> Self {
        Self {
            synth: FallbackSynthesizer::new(sample_rate, seed),
            block_frames: block_frames.max(1),
        }
    }

    /// The synthesizer.
    pub fn synth(&self) -> &FallbackSynthesizer {
        &self.synth
    }

    /// Frames per rendered block.
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Whether the synthesizer is running.
    pub fn is_playing(&self) -> bool {
        self.synth.is_playing()
    }

    /// Render the next block, or `None` while not playing.
    pub fn render_block(&mut self) -> Option<AudioChunk> {
        self.synth
            .is_playing()
            .then(|| self.synth.render_chunk(self.block_frames))
    }

    /// Start or resume.
    pub fn start(&mut self) {
        self.synth.play();
    }

    /// Suspend.
    pub fn suspend(&mut self) {
        self.synth.pause();
    }

    /// Stop and rewind.
    pub fn halt(&mut self) {
        self.synth.stop();
    }

    /// Apply prompts and parameters in one go.
    pub fn apply(&mut self, prompts: &[Prompt], params: &ParameterSet) {
        self.synth.set_prompts(prompts);
        self.synth.set_parameters(params);
    }

    /// Restart the clock at a new tempo if it differs.
    pub fn retempo(&mut self, bpm: f32) {
        if self.synth.tempo_bpm() != bpm {
            self.synth.set_tempo(bpm);
        }
    }
}

#[async_trait]
impl Engine for FallbackEngine {
    fn kind(&self) -> ActiveEngine {
        ActiveEngine::Fallback
    }

    async fn play(&mut self) -> Result<()> {
        self.start();
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.suspend();
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.halt();
        Ok(())
    }

    async fn set_prompts(&mut self, prompts: &[Prompt]) -> Result<()> {
        self.synth.set_prompts(prompts);
        Ok(())
    }

    async fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        self.synth.set_parameters(params);
        Ok(())
    }

    async fn set_tempo(&mut self, bpm: f32) -> Result<()> {
        self.retempo(bpm);
        Ok(())
    }
}
