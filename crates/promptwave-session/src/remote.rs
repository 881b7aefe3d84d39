//! Engine backed by a remote live-music session.

use async_trait::async_trait;
use promptwave_core::{ActiveEngine, ParameterSet, Prompt};

use crate::Result;
use crate::engine::Engine;
use crate::protocol::{GenerationConfig, MusicSession};

/// Drives a [`MusicSession`].
///
/// The service cannot change tempo during generation. Guidance, density and
/// brightness are sent live with the tempo that is already playing; a new
/// tempo is held back and sent right before the next `play`.
pub struct RemoteEngine {
    session: Box<dyn MusicSession>,
    params: ParameterSet,
    applied_tempo: Option<f32>,
}

impl std::fmt::Debug for RemoteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEngine")
            .field("params", &self.params)
            .field("applied_tempo", &self.applied_tempo)
            .finish_non_exhaustive()
    }
}

impl RemoteEngine {
    /// Wrap a freshly connected session.
    pub fn new(session: Box<dyn MusicSession>) -> Self {
        Self {
            session,
            params: ParameterSet::default(),
            applied_tempo: None,
        }
    }

    /// Tempo the service is generating at, once any config was sent.
    pub fn applied_tempo(&self) -> Option<f32> {
        self.applied_tempo
    }

    /// Whether a tempo change waits for the next `play`.
    pub fn tempo_pending(&self) -> bool {
        self.applied_tempo != Some(self.params.tempo_bpm())
    }

    /// Close the underlying connection.
    pub async fn close(mut self) {
        self.session.close().await;
    }
}

#[async_trait]
impl Engine for RemoteEngine {
    fn kind(&self) -> ActiveEngine {
        ActiveEngine::Remote
    }

    async fn play(&mut self) -> Result<()> {
        if self.tempo_pending() {
            let bpm = self.params.tempo_bpm();
            self.session
                .set_config(&GenerationConfig::from(&self.params))
                .await?;
            self.applied_tempo = Some(bpm);
            tracing::debug!(bpm, "remote tempo applied");
        }
        self.session.play().await
    }

    async fn pause(&mut self) -> Result<()> {
        self.session.pause().await
    }

    async fn stop(&mut self) -> Result<()> {
        self.session.stop().await
    }

    async fn set_prompts(&mut self, prompts: &[Prompt]) -> Result<()> {
        self.session.set_weighted_prompts(prompts).await
    }

    async fn set_parameters(&mut self, params: &ParameterSet) -> Result<()> {
        self.params = *params;
        let bpm = *self.applied_tempo.get_or_insert(params.tempo_bpm());
        self.session
            .set_config(&GenerationConfig::with_tempo(params, bpm))
            .await
    }

    async fn set_tempo(&mut self, bpm: f32) -> Result<()> {
        let update = promptwave_core::ParameterUpdate::tempo(bpm);
        self.params = self.params.merge(&update).parameters;
        if self.tempo_pending() {
            tracing::debug!(bpm, "remote tempo change deferred to next play");
        }
        Ok(())
    }
}
