//! Public handle over the session actor.

use std::sync::Arc;

use promptwave_config::EngineConfig;
use promptwave_core::{
    ActiveEngine, ParameterSet, ParameterUpdate, PlaybackState, PromptSet,
};
use promptwave_io::OutputDevice;
use tokio::sync::{mpsc, oneshot, watch};

use crate::actor::{Ack, Command, SessionActor};
use crate::bus::{EventBus, EventReceiver};
use crate::protocol::MusicConnector;
use crate::{Result, SessionError};

const COMMAND_CAPACITY: usize = 64;

/// State of the session as of the last processed command or event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Playback state.
    pub playback: PlaybackState,
    /// Generator supplying audio.
    pub engine: ActiveEngine,
    /// Reconnect attempts since the last healthy session.
    pub retry_count: u32,
    /// Whether a reconnect is scheduled or in flight.
    pub is_reconnecting: bool,
    /// Whether the remote path was given up for good.
    pub fallback_locked: bool,
    /// Stored prompts, including muted and filtered ones.
    pub prompts: PromptSet,
    /// Current generation parameters.
    pub parameters: ParameterSet,
    /// Prompt texts rejected by the content policy.
    pub filtered: Vec<String>,
    /// Master volume.
    pub volume: f32,
}

/// Handle to a running session.
///
/// Cheap to clone; every clone talks to the same actor. Each operation
/// returns the snapshot taken right after the actor applied it.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use promptwave_config::EngineConfig;
/// use promptwave_core::PromptSet;
/// use promptwave_io::VirtualOutput;
/// use promptwave_session::{LyriaConnector, MusicConnector, SessionManager};
///
/// # async fn run() -> promptwave_session::Result<()> {
/// let config = EngineConfig::default();
/// let connector = LyriaConnector::from_config(&config)
///     .map(|c| Arc::new(c) as Arc<dyn MusicConnector>);
/// let (session, mut events) =
///     SessionManager::init(config, Box::new(VirtualOutput::new(48000)), connector)?;
///
/// session
///     .set_prompts(PromptSet::from_pairs([("Minimal techno", 1.0)]).unwrap())
///     .await?;
/// session.play().await?;
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    bus: EventBus,
}

impl SessionManager {
    /// Start a session on the current tokio runtime.
    ///
    /// Returns the handle and a receiver subscribed before the actor ran,
    /// so startup notices (such as missing credentials) are not missed.
    /// Without a connector, or without an API key in `config`, the session
    /// runs on the local fallback only.
    pub fn init(
        config: EngineConfig,
        device: Box<dyn OutputDevice>,
        connector: Option<Arc<dyn MusicConnector>>,
    ) -> Result<(Self, EventReceiver)> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::NoRuntime(e.to_string()))?;

        let bus = EventBus::new(config.event_capacity);
        let events = bus.subscribe();
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::default());

        let actor = SessionActor::new(config, device, connector, bus.clone(), snapshot_tx, command_rx);
        runtime.spawn(actor.run());

        Ok((
            Self {
                commands,
                snapshot,
                bus,
            },
            events,
        ))
    }

    async fn request(&self, command: impl FnOnce(Ack) -> Command) -> Result<SessionSnapshot> {
        let (ack, reply) = oneshot::channel();
        self.commands
            .send(command(ack))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply.await.map_err(|_| SessionError::Closed)
    }

    /// Replace the prompts.
    pub async fn set_prompts(&self, prompts: PromptSet) -> Result<SessionSnapshot> {
        self.request(|ack| Command::SetPrompts(prompts, ack)).await
    }

    /// Merge a parameter update.
    pub async fn set_parameters(&self, update: ParameterUpdate) -> Result<SessionSnapshot> {
        self.request(|ack| Command::SetParameters(update, ack)).await
    }

    /// Start or resume playback. Calling it while loading stops instead.
    pub async fn play(&self) -> Result<SessionSnapshot> {
        self.request(Command::Play).await
    }

    /// Pause playback with a short fade.
    pub async fn pause(&self) -> Result<SessionSnapshot> {
        self.request(Command::Pause).await
    }

    /// Stop playback and tear down the remote session.
    pub async fn stop(&self) -> Result<SessionSnapshot> {
        self.request(Command::Stop).await
    }

    /// Set master volume in `[0, 1]`.
    pub async fn set_volume(&self, volume: f32) -> Result<SessionSnapshot> {
        self.request(|ack| Command::SetVolume(volume, ack)).await
    }

    /// Stop everything and end the actor. Other clones see
    /// [`SessionError::Closed`] afterwards.
    pub async fn destroy(self) -> Result<SessionSnapshot> {
        self.request(Command::Destroy).await
    }

    /// Receive events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    /// Latest published snapshot, without a round-trip to the actor.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshots as they change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Whether the actor is still running.
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }
}
