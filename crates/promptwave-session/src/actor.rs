//! The session actor.
//!
//! One tokio task owns the playback state, the engine slot, the reconnect
//! counters and the [`AudioScheduler`]. Everything else talks to it through
//! channels:
//!
//! ```text
//!   SessionManager ──Command──▶ ┌──────────────┐ ──▶ AudioScheduler ──▶ OutputDevice
//!   connect task ──outcome───▶ │ SessionActor │
//!   remote link ──ServerMsg──▶ └──────────────┘ ──▶ EventBus / watch snapshot
//! ```
//!
//! Connect attempts run in spawned tasks. Each carries the epoch it was
//! started in; `pause` and `stop` bump the epoch and cancel the attempt's
//! token, so a late result is dropped instead of reviving a session.

use std::future::pending;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use promptwave_config::EngineConfig;
use promptwave_core::{
    FilteredPromptRegistry, ParameterSet, ParameterUpdate, PlaybackState, Prompt, PromptSet,
    ReconnectDecision, ReconnectPolicy, ReconnectState, SessionEvent,
};
use promptwave_io::{AudioScheduler, OutputDevice};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::engine::{Engine, EngineSlot};
use crate::fallback::FallbackEngine;
use crate::manager::SessionSnapshot;
use crate::protocol::{MusicConnector, RemoteLink, ServerMessage};
use crate::remote::RemoteEngine;
use crate::{Result, SessionError};

/// Reply channel carrying the post-command snapshot.
pub(crate) type Ack = oneshot::Sender<SessionSnapshot>;

/// Requests from [`SessionManager`](crate::SessionManager).
#[derive(Debug)]
pub(crate) enum Command {
    SetPrompts(PromptSet, Ack),
    SetParameters(ParameterUpdate, Ack),
    Play(Ack),
    Pause(Ack),
    Stop(Ack),
    SetVolume(f32, Ack),
    Destroy(Ack),
}

/// Result of a connect attempt, tagged with the epoch it belongs to.
struct ConnectOutcome {
    epoch: u64,
    result: Result<RemoteLink>,
}

/// A call forwarded to whichever engine is installed.
enum EngineOp {
    Play,
    Prompts(Vec<Prompt>),
    Parameters(ParameterSet, Option<f32>),
}

const VOLUME_RAMP: Duration = Duration::from_millis(50);
const FALLBACK_SEED: u32 = 0x5EED_1234;

pub(crate) struct SessionActor {
    config: EngineConfig,
    policy: ReconnectPolicy,
    connector: Option<Arc<dyn MusicConnector>>,
    startup_notice: Option<&'static str>,
    scheduler: AudioScheduler,
    bus: EventBus,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    commands: mpsc::Receiver<Command>,

    playback: PlaybackState,
    engine: EngineSlot,
    fallback_locked: bool,
    prompts: PromptSet,
    parameters: ParameterSet,
    filtered: FilteredPromptRegistry,
    reconnect: ReconnectState,
    volume: f32,

    inbound: Option<mpsc::UnboundedReceiver<ServerMessage>>,
    epoch: u64,
    connect_cancel: Option<CancellationToken>,
    connect_tx: mpsc::UnboundedSender<ConnectOutcome>,
    connect_rx: mpsc::UnboundedReceiver<ConnectOutcome>,
    retry_at: Option<Instant>,
    loading_deadline: Option<Instant>,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}

async fn next_message(
    inbound: &mut Option<mpsc::UnboundedReceiver<ServerMessage>>,
) -> Option<ServerMessage> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

/// Close a session that is no longer wanted.
fn discard(slot: EngineSlot) {
    if let EngineSlot::Remote(remote) = slot {
        tokio::spawn(remote.close());
    }
}

impl SessionActor {
    pub(crate) fn new(
        config: EngineConfig,
        device: Box<dyn OutputDevice>,
        connector: Option<Arc<dyn MusicConnector>>,
        bus: EventBus,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let startup_notice = match (&connector, config.has_credentials()) {
            (None, _) => Some("no remote service configured; using the local fallback synthesizer"),
            (Some(_), false) => Some("no API key configured; using the local fallback synthesizer"),
            (Some(_), true) => None,
        };
        let connector = connector.filter(|_| startup_notice.is_none());
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();

        Self {
            policy: config.reconnect_policy(),
            scheduler: AudioScheduler::new(device, config.scheduler_config()),
            volume: config.initial_volume.clamp(0.0, 1.0),
            config,
            connector,
            startup_notice,
            bus,
            snapshot_tx,
            commands,
            playback: PlaybackState::Stopped,
            engine: EngineSlot::Idle,
            fallback_locked: false,
            prompts: PromptSet::default(),
            parameters: ParameterSet::default(),
            filtered: FilteredPromptRegistry::new(),
            reconnect: ReconnectState::new(),
            inbound: None,
            epoch: 0,
            connect_cancel: None,
            connect_tx,
            connect_rx,
            retry_at: None,
            loading_deadline: None,
        }
    }

    pub(crate) async fn run(mut self) {
        self.startup();

        let mut tick = tokio::time::interval(self.config.fallback_block());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let retry_at = self.retry_at;
            let loading_deadline = self.loading_deadline;
            let rendering = self.fallback_rendering();

            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        self.shutdown().await;
                        break;
                    };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                Some(outcome) = self.connect_rx.recv() => self.on_connect_outcome(outcome).await,
                message = next_message(&mut self.inbound) => match message {
                    Some(message) => self.on_server_message(message).await,
                    None => self.on_connection_failure("connection lost"),
                },
                () = sleep_until_opt(retry_at) => self.on_retry_due(),
                () = sleep_until_opt(loading_deadline) => self.on_lookahead_filled(),
                _ = tick.tick(), if rendering => self.refill_fallback(),
            }
            self.publish();
        }

        self.publish();
        tracing::info!("session actor stopped");
    }

    fn startup(&mut self) {
        self.scheduler.set_gain(self.volume, Duration::ZERO);
        if let Some(notice) = self.startup_notice {
            tracing::warn!("{notice}");
            self.fallback_locked = true;
            self.install_fallback();
            self.bus.emit(SessionEvent::error(notice));
        }
        self.publish();
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        let (ack, flow) = match command {
            Command::SetPrompts(prompts, ack) => {
                self.set_prompts(prompts).await;
                (ack, ControlFlow::Continue(()))
            }
            Command::SetParameters(update, ack) => {
                self.set_parameters(update).await;
                (ack, ControlFlow::Continue(()))
            }
            Command::Play(ack) => {
                self.play().await;
                (ack, ControlFlow::Continue(()))
            }
            Command::Pause(ack) => {
                self.pause().await;
                (ack, ControlFlow::Continue(()))
            }
            Command::Stop(ack) => {
                self.stop().await;
                (ack, ControlFlow::Continue(()))
            }
            Command::SetVolume(volume, ack) => {
                self.set_volume(volume);
                (ack, ControlFlow::Continue(()))
            }
            Command::Destroy(ack) => {
                self.shutdown().await;
                (ack, ControlFlow::Break(()))
            }
        };
        self.publish();
        let _ = ack.send(self.snapshot());
        flow
    }

    // -- state helpers -----------------------------------------------------

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            playback: self.playback,
            engine: self.engine.kind(),
            retry_count: self.reconnect.retry_count(),
            is_reconnecting: self.reconnect.is_reconnecting(),
            fallback_locked: self.fallback_locked,
            prompts: self.prompts.clone(),
            parameters: self.parameters,
            filtered: self.filtered.texts(),
            volume: self.volume,
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn set_playback(&mut self, state: PlaybackState) {
        if self.playback != state {
            tracing::info!(from = %self.playback, to = %state, "playback state changed");
            self.playback = state;
            self.bus.emit(SessionEvent::PlaybackStateChanged(state));
        }
    }

    /// Swap the engine slot, announcing a change of kind. Returns the old slot.
    fn set_engine(&mut self, slot: EngineSlot) -> EngineSlot {
        let before = self.engine.kind();
        let old = std::mem::replace(&mut self.engine, slot);
        let after = self.engine.kind();
        if before != after {
            tracing::info!(engine = %after, "active engine changed");
            self.bus.emit(SessionEvent::EngineChanged(after));
        }
        old
    }

    fn remote_enabled(&self) -> bool {
        !self.fallback_locked && self.connector.is_some()
    }

    fn connecting(&self) -> bool {
        self.connect_cancel.is_some()
    }

    fn fallback_rendering(&self) -> bool {
        self.playback == PlaybackState::Playing
            && matches!(&self.engine, EngineSlot::Fallback(e) if e.is_playing())
    }

    /// Forget any in-flight attempt and pending timers.
    fn cancel_pending(&mut self) {
        self.epoch += 1;
        if let Some(token) = self.connect_cancel.take() {
            token.cancel();
        }
        self.retry_at = None;
        self.loading_deadline = None;
        self.reconnect.cancel();
    }

    fn drop_remote(&mut self) {
        self.inbound = None;
        if self.engine.is_remote() {
            let old = self.set_engine(EngineSlot::Idle);
            discard(old);
        }
    }

    fn install_fallback(&mut self) {
        let mut engine = FallbackEngine::new(
            self.config.sample_rate,
            self.config.fallback_block_frames(),
            FALLBACK_SEED,
        );
        engine.apply(&self.prompts.active(&self.filtered), &self.parameters);
        let old = self.set_engine(EngineSlot::Fallback(engine));
        discard(old);
    }

    /// Forward a call to the installed engine. A failure runs the
    /// connection-failure procedure. Returns whether the call succeeded.
    async fn drive(&mut self, op: EngineOp) -> bool {
        let Some(engine) = self.engine.as_engine_mut() else {
            return true;
        };
        let result = match op {
            EngineOp::Play => engine.play().await,
            EngineOp::Prompts(prompts) => engine.set_prompts(&prompts).await,
            EngineOp::Parameters(params, tempo) => match engine.set_parameters(&params).await {
                Ok(()) => match tempo {
                    Some(bpm) => engine.set_tempo(bpm).await,
                    None => Ok(()),
                },
                Err(e) => Err(e),
            },
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "engine call failed");
                self.on_connection_failure(&e.to_string());
                false
            }
        }
    }

    // -- commands ----------------------------------------------------------

    async fn set_prompts(&mut self, prompts: PromptSet) {
        self.prompts = prompts;
        let active = self.prompts.active(&self.filtered);
        if active.is_empty() {
            if self.playback.is_active() {
                self.pause_without_prompts().await;
            }
            return;
        }
        self.drive(EngineOp::Prompts(active)).await;
    }

    async fn set_parameters(&mut self, update: ParameterUpdate) {
        let change = self.parameters.merge(&update);
        self.parameters = change.parameters;
        let tempo = change.tempo_changed.then(|| self.parameters.tempo_bpm());
        if let Some(bpm) = tempo {
            tracing::debug!(bpm, "tempo changed");
        }
        self.drive(EngineOp::Parameters(self.parameters, tempo)).await;
    }

    async fn play(&mut self) {
        match self.playback {
            PlaybackState::Playing => {}
            PlaybackState::Loading => {
                tracing::debug!("play requested while loading, stopping");
                self.stop().await;
            }
            PlaybackState::Stopped | PlaybackState::Paused => {
                if self.remote_enabled() {
                    self.play_remote().await;
                } else {
                    self.play_fallback();
                }
            }
        }
    }

    fn play_fallback(&mut self) {
        if self.engine.fallback_mut().is_none() {
            self.install_fallback();
        }
        if let Some(engine) = self.engine.fallback_mut() {
            engine.start();
        }
        self.set_playback(PlaybackState::Playing);
    }

    async fn play_remote(&mut self) {
        if !self.prompts.has_active(&self.filtered) {
            self.bus.emit(SessionEvent::error(
                "no active prompts: add a prompt with a weight above zero before playing",
            ));
            return;
        }
        self.set_playback(PlaybackState::Loading);
        if self.engine.is_remote() {
            self.drive(EngineOp::Play).await;
        } else if !self.connecting() && self.retry_at.is_none() {
            self.start_connect();
        }
    }

    async fn pause(&mut self) {
        if !self.playback.is_active() {
            return;
        }
        self.cancel_pending();
        let paused = match &mut self.engine {
            EngineSlot::Remote(remote) => remote.pause().await,
            EngineSlot::Fallback(fallback) => {
                fallback.suspend();
                Ok(())
            }
            EngineSlot::Idle => Ok(()),
        };
        if let Err(e) = paused {
            tracing::warn!(error = %e, "pause failed, dropping remote session");
            self.drop_remote();
        }
        self.scheduler.reset();
        self.set_playback(PlaybackState::Paused);
    }

    async fn pause_without_prompts(&mut self) {
        self.pause().await;
        self.bus.emit(SessionEvent::error(
            "all prompts are filtered or muted; playback paused",
        ));
    }

    async fn stop(&mut self) {
        self.cancel_pending();
        self.reconnect.reset();
        self.filtered.clear();
        self.inbound = None;

        let stopped = match &mut self.engine {
            EngineSlot::Remote(remote) => remote.stop().await,
            EngineSlot::Fallback(fallback) => {
                fallback.halt();
                Ok(())
            }
            EngineSlot::Idle => Ok(()),
        };
        if let Err(e) = stopped {
            tracing::debug!(error = %e, "stop not delivered");
        }
        self.drop_remote();

        self.scheduler.reset();
        self.set_playback(PlaybackState::Stopped);
    }

    fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            tracing::warn!(volume, "ignoring non-finite volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.scheduler.set_gain(self.volume, VOLUME_RAMP);
    }

    async fn shutdown(&mut self) {
        self.stop().await;
        let old = self.set_engine(EngineSlot::Idle);
        discard(old);
        tracing::info!("session destroyed");
    }

    // -- remote connection -------------------------------------------------

    fn start_connect(&mut self) {
        let Some(connector) = self.connector.clone() else {
            return;
        };
        if let Some(token) = self.connect_cancel.take() {
            token.cancel();
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let token = CancellationToken::new();
        self.connect_cancel = Some(token.clone());

        let timeout = self.config.handshake_timeout();
        let results = self.connect_tx.clone();
        tracing::info!(epoch, attempt = self.reconnect.retry_count(), "connecting to remote service");

        tokio::spawn(async move {
            let result = tokio::select! {
                () = token.cancelled() => Err(SessionError::Cancelled),
                r = tokio::time::timeout(timeout, connector.connect()) => {
                    r.unwrap_or_else(|_| Err(SessionError::Timeout(timeout)))
                }
            };
            let _ = results.send(ConnectOutcome { epoch, result });
        });
    }

    async fn on_connect_outcome(&mut self, outcome: ConnectOutcome) {
        if outcome.epoch != self.epoch || !self.connecting() {
            if let Ok(link) = outcome.result {
                tracing::debug!(epoch = outcome.epoch, "discarding stale session");
                discard(EngineSlot::Remote(RemoteEngine::new(link.session)));
            }
            return;
        }
        self.connect_cancel = None;

        match outcome.result {
            Ok(link) => self.on_connected(link).await,
            Err(e) => {
                tracing::warn!(error = %e, "connect attempt failed");
                self.reconnect.attempt_failed();
                self.on_connection_failure(&e.to_string());
            }
        }
    }

    async fn on_connected(&mut self, link: RemoteLink) {
        self.reconnect.succeed();
        let RemoteLink { session, messages } = link;
        self.inbound = Some(messages);
        let old = self.set_engine(EngineSlot::Remote(RemoteEngine::new(session)));
        discard(old);
        tracing::info!("remote session ready");

        let active = self.prompts.active(&self.filtered);
        if !active.is_empty() && !self.drive(EngineOp::Prompts(active)).await {
            return;
        }
        if !self.drive(EngineOp::Parameters(self.parameters, None)).await {
            return;
        }
        if self.playback.is_active() {
            self.drive(EngineOp::Play).await;
        }
    }

    fn on_retry_due(&mut self) {
        self.retry_at = None;
        if self.remote_enabled() {
            self.start_connect();
        }
    }

    /// Discard the session and either schedule a retry or give up on the
    /// remote path for good.
    fn on_connection_failure(&mut self, reason: &str) {
        self.drop_remote();
        if !self.remote_enabled() {
            return;
        }
        if !self.playback.is_active() {
            tracing::debug!(reason, "connection lost while idle");
            self.reconnect.cancel();
            return;
        }

        match self.reconnect.begin_retry(&self.policy) {
            None => tracing::debug!(reason, "retry already pending"),
            Some(ReconnectDecision::Retry { attempt, delay }) => {
                let max = self.policy.max_retries();
                tracing::warn!(
                    attempt,
                    max,
                    delay_ms = delay.as_millis() as u64,
                    reason,
                    "reconnect scheduled"
                );
                self.retry_at = Some(Instant::now() + delay);
                self.bus.emit(SessionEvent::Reconnecting {
                    attempt,
                    max,
                    delay,
                    reason: reason.to_string(),
                });
            }
            Some(ReconnectDecision::Exhausted) => self.engage_fallback(reason),
        }
    }

    fn engage_fallback(&mut self, reason: &str) {
        tracing::warn!(reason, max = self.policy.max_retries(), "reconnects exhausted, fallback engaged");
        self.fallback_locked = true;
        self.cancel_pending();
        self.drop_remote();
        self.install_fallback();

        if !self.config.auto_resume_fallback {
            self.scheduler.reset();
            self.set_playback(PlaybackState::Stopped);
            return;
        }
        if self.playback.is_active() {
            if let Some(engine) = self.engine.fallback_mut() {
                engine.start();
            }
            self.set_playback(PlaybackState::Playing);
        }
    }

    // -- inbound -----------------------------------------------------------

    async fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::SetupComplete => tracing::debug!("setup complete"),
            ServerMessage::AudioChunks(payloads) => self.on_audio(&payloads),
            ServerMessage::FilteredPrompt { text, reason } => self.on_filtered(text, reason).await,
            ServerMessage::Warning { message } => {
                tracing::warn!(message = %message, "remote service warning");
            }
            ServerMessage::Closed { code, reason } => {
                self.on_connection_failure(&format!("connection closed ({code}): {reason}"));
            }
            ServerMessage::Error { message } => self.on_connection_failure(&message),
        }
    }

    fn on_audio(&mut self, payloads: &[String]) {
        if !self.playback.is_active() {
            tracing::debug!(count = payloads.len(), "dropping audio while not playing");
            return;
        }
        let mut scheduled = false;
        for payload in payloads {
            scheduled |= self.scheduler.enqueue_payload(payload).is_some();
        }
        if scheduled
            && self.playback == PlaybackState::Loading
            && self.loading_deadline.is_none()
        {
            self.loading_deadline = Some(Instant::now() + self.config.lookahead());
            tracing::debug!("first chunk scheduled, filling lookahead");
        }
    }

    fn on_lookahead_filled(&mut self) {
        self.loading_deadline = None;
        if self.playback == PlaybackState::Loading {
            self.set_playback(PlaybackState::Playing);
        }
    }

    async fn on_filtered(&mut self, text: String, reason: String) {
        tracing::warn!(prompt = %text, reason = %reason, "prompt filtered");
        if !self.filtered.insert(text.clone()) {
            return;
        }
        self.bus.emit(SessionEvent::FilteredPrompt { text, reason });
        if self.playback.is_active() && !self.prompts.has_active(&self.filtered) {
            self.pause_without_prompts().await;
        }
    }

    // -- fallback rendering ------------------------------------------------

    /// Top the schedule up to two blocks ahead of the device clock. A late
    /// tick renders as many blocks as the deficit needs.
    fn refill_fallback(&mut self) {
        let block = self.config.fallback_block();
        let target = 2.0 * block.as_secs_f64();
        while self.scheduler.buffered_ahead() < target {
            let Some(chunk) = self.engine.fallback_mut().and_then(FallbackEngine::render_block)
            else {
                break;
            };
            self.scheduler.enqueue_with_lookahead(chunk, block);
        }
    }
}
