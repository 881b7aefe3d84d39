//! Audio generator abstraction.
//!
//! The actor holds at most one generator in an [`EngineSlot`]. Both variants
//! implement [`Engine`]; the public [`ActiveEngine`] is derived from the slot.

use async_trait::async_trait;
use promptwave_core::{ActiveEngine, ParameterSet, Prompt};

use crate::Result;
use crate::fallback::FallbackEngine;
use crate::remote::RemoteEngine;

/// Controls shared by every audio generator.
#[async_trait]
pub trait Engine: Send {
    /// Which generator this is.
    fn kind(&self) -> ActiveEngine;

    /// Start or resume generation.
    async fn play(&mut self) -> Result<()>;

    /// Suspend generation, keeping state for a fast resume.
    async fn pause(&mut self) -> Result<()>;

    /// End generation.
    async fn stop(&mut self) -> Result<()>;

    /// Replace the prompts. Callers pass the active subset only.
    async fn set_prompts(&mut self, prompts: &[Prompt]) -> Result<()>;

    /// Apply guidance, density and brightness (and tempo where the engine
    /// applies it live).
    async fn set_parameters(&mut self, params: &ParameterSet) -> Result<()>;

    /// Change tempo.
    async fn set_tempo(&mut self, bpm: f32) -> Result<()>;
}

/// The generator currently owned by the session actor.
#[derive(Debug, Default)]
pub enum EngineSlot {
    /// Nothing connected or selected.
    #[default]
    Idle,
    /// Remote live-music session.
    Remote(RemoteEngine),
    /// Local synthesizer.
    Fallback(FallbackEngine),
}

impl EngineSlot {
    /// Public view of the slot.
    pub fn kind(&self) -> ActiveEngine {
        match self {
            EngineSlot::Idle => ActiveEngine::None,
            EngineSlot::Remote(e) => e.kind(),
            EngineSlot::Fallback(e) => e.kind(),
        }
    }

    /// The engine, if any.
    pub fn as_engine_mut(&mut self) -> Option<&mut dyn Engine> {
        match self {
            EngineSlot::Idle => None,
            EngineSlot::Remote(e) => Some(e),
            EngineSlot::Fallback(e) => Some(e),
        }
    }

    /// The fallback engine, if that is what the slot holds.
    pub fn fallback_mut(&mut self) -> Option<&mut FallbackEngine> {
        match self {
            EngineSlot::Fallback(e) => Some(e),
            _ => None,
        }
    }

    /// Whether a remote session is held.
    pub fn is_remote(&self) -> bool {
        matches!(self, EngineSlot::Remote(_))
    }
}
