//! Seams between the session actor and a remote live-music service.
//!
//! A [`MusicConnector`] produces a connected [`RemoteLink`]: an outbound
//! [`MusicSession`] plus a stream of [`ServerMessage`]s. The Lyria
//! implementation lives in [`crate::lyria`]; tests script their own.

use async_trait::async_trait;
use promptwave_core::{ParameterSet, Prompt};
use tokio::sync::mpsc;

use crate::Result;

/// Something the remote service told us.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The setup handshake finished.
    SetupComplete,
    /// A prompt was rejected by the content policy.
    FilteredPrompt {
        /// Rejected prompt text.
        text: String,
        /// Reason given by the service.
        reason: String,
    },
    /// Base64 PCM16 payloads, in arrival order.
    AudioChunks(Vec<String>),
    /// The connection was closed.
    Closed {
        /// Close code (1005 when none was sent).
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The connection failed.
    Error {
        /// Failure description.
        message: String,
    },
    /// A non-fatal notice from the service.
    Warning {
        /// Notice text.
        message: String,
    },
}

/// Generation settings as sent to the remote service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Tempo in bpm.
    pub bpm: f32,
    /// Guidance strength.
    pub guidance: f32,
    /// Note density.
    pub density: f32,
    /// Tonal brightness.
    pub brightness: f32,
}

impl GenerationConfig {
    /// Build from a parameter set, overriding the tempo.
    pub fn with_tempo(params: &ParameterSet, bpm: f32) -> Self {
        Self {
            bpm,
            guidance: params.guidance(),
            density: params.density(),
            brightness: params.brightness(),
        }
    }
}

impl From<&ParameterSet> for GenerationConfig {
    fn from(params: &ParameterSet) -> Self {
        Self::with_tempo(params, params.tempo_bpm())
    }
}

/// Playback control verbs understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackControl {
    /// Start or resume generation.
    Play,
    /// Suspend generation.
    Pause,
    /// End generation and reset the context.
    Stop,
}

impl PlaybackControl {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackControl::Play => "PLAY",
            PlaybackControl::Pause => "PAUSE",
            PlaybackControl::Stop => "STOP",
        }
    }
}

/// Outbound half of a live connection.
///
/// Every call resolves once the message was accepted by the transport.
#[async_trait]
pub trait MusicSession: Send {
    /// Replace the weighted prompts steering generation.
    async fn set_weighted_prompts(&mut self, prompts: &[Prompt]) -> Result<()>;

    /// Update generation settings.
    async fn set_config(&mut self, config: &GenerationConfig) -> Result<()>;

    /// Send a playback control verb.
    async fn control(&mut self, control: PlaybackControl) -> Result<()>;

    /// Start or resume generation.
    async fn play(&mut self) -> Result<()> {
        self.control(PlaybackControl::Play).await
    }

    /// Suspend generation.
    async fn pause(&mut self) -> Result<()> {
        self.control(PlaybackControl::Pause).await
    }

    /// End generation.
    async fn stop(&mut self) -> Result<()> {
        self.control(PlaybackControl::Stop).await
    }

    /// Close the connection. Never fails.
    async fn close(&mut self);
}

/// A connected session and its inbound message stream.
pub struct RemoteLink {
    /// Outbound half.
    pub session: Box<dyn MusicSession>,
    /// Inbound half. Ends when the connection is gone.
    pub messages: mpsc::UnboundedReceiver<ServerMessage>,
}

impl std::fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLink").finish_non_exhaustive()
    }
}

/// Opens remote sessions.
#[async_trait]
pub trait MusicConnector: Send + Sync {
    /// Connect and complete the setup handshake.
    ///
    /// Returns only after the service confirmed setup, so a returned link is
    /// a healthy session.
    async fn connect(&self) -> Result<RemoteLink>;
}
