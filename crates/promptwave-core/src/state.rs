//! Playback state machine vocabulary.

use core::fmt;

/// Playback state of a session. Exactly one instance lives in the session actor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing is playing and nothing is pending.
    #[default]
    Stopped,
    /// Waiting for the lookahead buffer to fill.
    Loading,
    /// Audio is being emitted.
    Playing,
    /// Emission suspended, engine kept for a fast resume.
    Paused,
}

impl PlaybackState {
    /// Whether playback is running or about to run.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Which generator currently supplies audio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActiveEngine {
    /// No generator selected yet.
    #[default]
    None,
    /// The remote generative-audio service.
    Remote,
    /// The local fallback synthesizer.
    Fallback,
}

impl fmt::Display for ActiveEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActiveEngine::None => "none",
            ActiveEngine::Remote => "remote",
            ActiveEngine::Fallback => "fallback",
        };
        f.write_str(name)
    }
}
