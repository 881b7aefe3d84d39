//! End-to-end tests of the session actor with a scripted remote service.
//!
//! Time is paused, so backoff and lookahead delays resolve instantly while
//! still being measured on the tokio clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use promptwave_config::EngineConfig;
use promptwave_core::{
    ActiveEngine, ParameterUpdate, PlaybackState, Prompt, PromptSet, SessionEvent,
};
use promptwave_io::VirtualOutput;
use promptwave_session::{
    EventReceiver, GenerationConfig, MusicConnector, MusicSession, PlaybackControl, RemoteLink,
    Result, ServerMessage, SessionError, SessionManager,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Prompts(Vec<String>),
    Config(GenerationConfig),
    Control(PlaybackControl),
    Closed,
}

#[derive(Default)]
struct Script {
    fail_all: bool,
    delay: Duration,
    attempts: usize,
    sent: Vec<Sent>,
    servers: Vec<mpsc::UnboundedSender<ServerMessage>>,
}

#[derive(Clone, Default)]
struct FakeConnector(Arc<Mutex<Script>>);

impl FakeConnector {
    fn failing() -> Self {
        let fake = Self::default();
        fake.0.lock().fail_all = true;
        fake
    }

    fn slow(delay: Duration) -> Self {
        let fake = Self::default();
        fake.0.lock().delay = delay;
        fake
    }

    fn attempts(&self) -> usize {
        self.0.lock().attempts
    }

    fn sent(&self) -> Vec<Sent> {
        self.0.lock().sent.clone()
    }

    fn clear_sent(&self) {
        self.0.lock().sent.clear();
    }

    fn server(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.0.lock().servers.last().cloned().expect("no session opened")
    }

    fn push(&self, message: ServerMessage) {
        self.server().send(message).expect("actor dropped the link");
    }
}

#[async_trait]
impl MusicConnector for FakeConnector {
    async fn connect(&self) -> Result<RemoteLink> {
        let delay = {
            let mut script = self.0.lock();
            script.attempts += 1;
            script.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.0.lock();
        if script.fail_all {
            return Err(SessionError::transport("connection refused"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        script.servers.push(tx);
        Ok(RemoteLink {
            session: Box::new(FakeSession(self.0.clone())),
            messages: rx,
        })
    }
}

struct FakeSession(Arc<Mutex<Script>>);

#[async_trait]
impl MusicSession for FakeSession {
    async fn set_weighted_prompts(&mut self, prompts: &[Prompt]) -> Result<()> {
        let texts = prompts.iter().map(|p| p.text().to_string()).collect();
        self.0.lock().sent.push(Sent::Prompts(texts));
        Ok(())
    }

    async fn set_config(&mut self, config: &GenerationConfig) -> Result<()> {
        self.0.lock().sent.push(Sent::Config(*config));
        Ok(())
    }

    async fn control(&mut self, control: PlaybackControl) -> Result<()> {
        self.0.lock().sent.push(Sent::Control(control));
        Ok(())
    }

    async fn close(&mut self) {
        self.0.lock().sent.push(Sent::Closed);
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        api_key: Some("test-key".to_string()),
        ..EngineConfig::default()
    }
}

fn start(
    connector: &FakeConnector,
    config: EngineConfig,
) -> (SessionManager, EventReceiver, VirtualOutput) {
    let device = VirtualOutput::new(config.sample_rate);
    let connector: Arc<dyn MusicConnector> = Arc::new(connector.clone());
    let (session, events) =
        SessionManager::init(config, Box::new(device.clone()), Some(connector)).unwrap();
    (session, events, device)
}

fn prompts(pairs: &[(&str, f32)]) -> PromptSet {
    PromptSet::from_pairs(pairs.iter().copied()).unwrap()
}

/// 0.1 s of stereo silence as the service would send it.
fn payload() -> String {
    base64::engine::general_purpose::STANDARD.encode(vec![0u8; 4800 * 4])
}

async fn next_event(events: &mut EventReceiver) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("no event within timeout")
        .expect("event bus closed")
}

async fn wait_for(
    events: &mut EventReceiver,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Give the actor a chance to drain its queues.
async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never became true");
}

fn drain(events: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn play_loads_then_plays_after_lookahead() {
    let remote = FakeConnector::default();
    let (session, mut events, device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Bossa Nova", 1.0), ("Chillwave", 0.5)]))
        .await
        .unwrap();
    let snapshot = session.play().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Loading);

    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;
    let sent = remote.sent();
    assert_eq!(
        sent[0],
        Sent::Prompts(vec!["Bossa Nova".to_string(), "Chillwave".to_string()])
    );
    assert!(matches!(sent[1], Sent::Config(c) if c.bpm == 120.0));

    let first_chunk = Instant::now();
    remote.push(ServerMessage::AudioChunks(vec![payload()]));
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;
    let waited = first_chunk.elapsed();
    assert!(waited >= Duration::from_millis(1500), "waited {waited:?}");
    assert!(waited < Duration::from_millis(1600), "waited {waited:?}");

    let spans = device.spans();
    assert_eq!(spans.len(), 1);
    assert!((spans[0].start - 1.5).abs() < 1e-9);
    assert_eq!(session.snapshot().engine, ActiveEngine::Remote);
}

#[tokio::test(start_paused = true)]
async fn pause_resets_schedule_and_resume_skips_filtered_prompts() {
    let remote = FakeConnector::default();
    let (session, mut events, device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Funk", 1.0), ("Forbidden", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;

    remote.push(ServerMessage::FilteredPrompt {
        text: "Forbidden".to_string(),
        reason: "policy".to_string(),
    });
    let filtered = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::FilteredPrompt { .. })
    })
    .await;
    assert_eq!(
        filtered,
        SessionEvent::FilteredPrompt {
            text: "Forbidden".to_string(),
            reason: "policy".to_string()
        }
    );

    remote.push(ServerMessage::AudioChunks(vec![payload(), payload()]));
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;
    assert_eq!(device.spans().len(), 2);

    let snapshot = session.pause().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Paused);
    assert_eq!(device.disconnects().len(), 1);

    remote.clear_sent();
    let snapshot = session.play().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Loading);
    assert_eq!(remote.sent(), vec![Sent::Control(PlaybackControl::Play)]);

    // Scheduling starts over with a fresh lookahead.
    device.set_time(10.0);
    remote.push(ServerMessage::AudioChunks(vec![payload()]));
    settle().await;
    let spans = device.spans();
    assert!((spans[spans.len() - 1].start - 11.5).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn set_prompts_forwards_only_the_active_subset() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Dubstep", 1.0), ("Polka", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;

    remote.push(ServerMessage::FilteredPrompt {
        text: "Polka".to_string(),
        reason: "policy".to_string(),
    });
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::FilteredPrompt { .. })
    })
    .await;

    remote.clear_sent();
    session
        .set_prompts(prompts(&[("Dubstep", 0.8), ("Polka", 1.0), ("Sitar", 0.0)]))
        .await
        .unwrap();
    assert_eq!(
        remote.sent(),
        vec![Sent::Prompts(vec!["Dubstep".to_string()])]
    );
}

#[tokio::test(start_paused = true)]
async fn filtering_the_last_prompt_pauses_with_one_error() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Shoegaze", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;
    remote.push(ServerMessage::AudioChunks(vec![payload()]));
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;

    remote.push(ServerMessage::FilteredPrompt {
        text: "Shoegaze".to_string(),
        reason: "policy".to_string(),
    });
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Paused)
    })
    .await;
    settle().await;

    let errors = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
    assert_eq!(session.snapshot().playback, PlaybackState::Paused);
    assert_eq!(session.snapshot().filtered, vec!["Shoegaze".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn muting_every_prompt_while_playing_pauses() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Trance", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;
    remote.push(ServerMessage::AudioChunks(vec![payload()]));
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;

    let snapshot = session
        .set_prompts(prompts(&[("Trance", 0.0)]))
        .await
        .unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Paused);
    let errors = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test(start_paused = true)]
async fn play_without_active_prompts_reports_error() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, config());

    let snapshot = session.play().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Stopped);
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Error { .. }
    ));
    settle().await;
    assert_eq!(remote.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_lock_the_fallback() {
    let remote = FakeConnector::failing();
    let (session, mut events, device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Minimal techno", 1.0)]))
        .await
        .unwrap();
    session
        .set_parameters(ParameterUpdate {
            density: Some(0.9),
            ..Default::default()
        })
        .await
        .unwrap();
    session.play().await.unwrap();

    let mut delays = Vec::new();
    loop {
        match next_event(&mut events).await {
            SessionEvent::Reconnecting {
                attempt,
                max,
                delay,
                ..
            } => {
                assert_eq!(max, 5);
                assert_eq!(attempt as usize, delays.len() + 1);
                delays.push(delay.as_secs());
            }
            SessionEvent::EngineChanged(ActiveEngine::Fallback) => break,
            _ => {}
        }
    }
    assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    assert_eq!(remote.attempts(), 6);

    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;
    let snapshot = session.snapshot();
    assert!(snapshot.fallback_locked);
    assert_eq!(snapshot.engine, ActiveEngine::Fallback);
    assert_eq!(snapshot.parameters.density(), 0.9);
    assert_eq!(snapshot.prompts.len(), 1);

    // The fallback feeds the scheduler on its own.
    wait_until(|| !device.spans().is_empty()).await;

    // No more remote attempts, whatever happens next.
    session.stop().await.unwrap();
    session.play().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(remote.attempts(), 6);
    assert_eq!(session.snapshot().engine, ActiveEngine::Fallback);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_retry() {
    let remote = FakeConnector::failing();
    let (session, mut events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Drum and bass", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_for(&mut events, |e| matches!(e, SessionEvent::Reconnecting { .. })).await;
    assert!(session.snapshot().is_reconnecting);

    let snapshot = session.stop().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Stopped);
    assert_eq!(snapshot.retry_count, 0);
    assert!(!snapshot.is_reconnecting);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.attempts(), 1);
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Reconnecting { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn late_connect_after_stop_is_ignored() {
    let remote = FakeConnector::slow(Duration::from_secs(5));
    let (session, _events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Ambient", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    settle().await;
    assert_eq!(remote.attempts(), 1);

    session.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.playback, PlaybackState::Stopped);
    assert_eq!(snapshot.engine, ActiveEngine::None);
    assert!(remote.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_link_reconnects_and_resumes() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Lo-fi", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;
    remote.push(ServerMessage::AudioChunks(vec![payload()]));
    wait_for(&mut events, |e| {
        *e == SessionEvent::PlaybackStateChanged(PlaybackState::Playing)
    })
    .await;

    remote.clear_sent();
    remote.push(ServerMessage::Closed {
        code: 1011,
        reason: "internal".to_string(),
    });
    let event = wait_for(&mut events, |e| matches!(e, SessionEvent::Reconnecting { .. })).await;
    let SessionEvent::Reconnecting {
        attempt,
        reason,
        delay,
        ..
    } = event
    else {
        unreachable!()
    };
    assert_eq!(attempt, 1);
    assert!(reason.contains("1011"));

    // The retry fires only once the backoff has fully elapsed.
    tokio::time::sleep(delay + Duration::from_millis(1)).await;
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;
    assert_eq!(remote.attempts(), 2);
    assert!(remote.sent().contains(&Sent::Closed));
    assert!(
        remote
            .sent()
            .contains(&Sent::Prompts(vec!["Lo-fi".to_string()]))
    );

    let snapshot = session.snapshot();
    assert_eq!(snapshot.playback, PlaybackState::Playing);
    assert_eq!(snapshot.engine, ActiveEngine::Remote);
    assert_eq!(snapshot.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_payloads_are_dropped() {
    let remote = FakeConnector::default();
    let (session, _events, device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Jazz", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;

    remote.push(ServerMessage::AudioChunks(vec![
        "%%% not base64 %%%".to_string(),
        payload(),
        "AAE=".to_string(),
        payload(),
    ]));
    settle().await;

    let spans = device.spans();
    assert_eq!(spans.len(), 2);
    assert!((spans[1].start - spans[0].end()).abs() < 1e-9);
    assert!(session.is_alive());
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_run_fallback_only() {
    let remote = FakeConnector::default();
    let (session, mut events, device) = start(&remote, EngineConfig::default());

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::EngineChanged(ActiveEngine::Fallback)
    );
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Error { .. }
    ));

    let snapshot = session.play().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Playing);
    assert_eq!(snapshot.engine, ActiveEngine::Fallback);
    assert!(snapshot.fallback_locked);

    wait_until(|| !device.spans().is_empty()).await;
    assert_eq!(remote.attempts(), 0);

    let errors = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .count();
    assert_eq!(errors, 0);
}

#[tokio::test(start_paused = true)]
async fn fallback_pauses_when_every_prompt_is_muted() {
    let remote = FakeConnector::default();
    let (session, mut events, _device) = start(&remote, EngineConfig::default());

    session
        .set_prompts(prompts(&[("Trance", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    settle().await;
    drain(&mut events);

    let snapshot = session
        .set_prompts(prompts(&[("Trance", 0.0)]))
        .await
        .unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Paused);
    assert_eq!(snapshot.engine, ActiveEngine::Fallback);

    settle().await;
    let errors = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test(start_paused = true)]
async fn remote_tempo_waits_for_next_play() {
    let remote = FakeConnector::default();
    let (session, _events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Disco", 1.0)]))
        .await
        .unwrap();
    session.play().await.unwrap();
    wait_until(|| remote.sent().contains(&Sent::Control(PlaybackControl::Play))).await;

    remote.clear_sent();
    session
        .set_parameters(ParameterUpdate::tempo(150.0))
        .await
        .unwrap();
    assert!(matches!(remote.sent()[..], [Sent::Config(c)] if c.bpm == 120.0));

    session.pause().await.unwrap();
    remote.clear_sent();
    session.play().await.unwrap();
    assert!(matches!(
        remote.sent()[..],
        [Sent::Config(c), Sent::Control(PlaybackControl::Play)] if c.bpm == 150.0
    ));
}

#[tokio::test(start_paused = true)]
async fn play_while_loading_stops() {
    let remote = FakeConnector::slow(Duration::from_secs(5));
    let (session, _events, _device) = start(&remote, config());

    session
        .set_prompts(prompts(&[("Ska", 1.0)]))
        .await
        .unwrap();
    assert_eq!(
        session.play().await.unwrap().playback,
        PlaybackState::Loading
    );
    assert_eq!(
        session.play().await.unwrap().playback,
        PlaybackState::Stopped
    );
}

#[tokio::test(start_paused = true)]
async fn volume_is_clamped_and_survives_pause() {
    let remote = FakeConnector::default();
    let (session, _events, device) = start(&remote, EngineConfig::default());

    assert_eq!(session.set_volume(1.7).await.unwrap().volume, 1.0);
    assert_eq!(session.set_volume(0.3).await.unwrap().volume, 0.3);
    session.play().await.unwrap();
    session.pause().await.unwrap();
    let snapshot = session.play().await.unwrap();
    assert_eq!(snapshot.volume, 0.3);

    let gains = device.gain_changes();
    assert_eq!(gains.first().map(|g| g.gain), Some(0.8));
    assert_eq!(gains.last().map(|g| g.gain), Some(0.3));
}

#[tokio::test(start_paused = true)]
async fn destroy_closes_every_handle() {
    let remote = FakeConnector::default();
    let (session, _events, _device) = start(&remote, config());
    let other = session.clone();

    let snapshot = session.destroy().await.unwrap();
    assert_eq!(snapshot.playback, PlaybackState::Stopped);
    assert!(matches!(other.play().await, Err(SessionError::Closed)));
    assert!(!other.is_alive());
}

#[test]
fn init_requires_a_runtime() {
    let result = SessionManager::init(
        EngineConfig::default(),
        Box::new(VirtualOutput::new(48000)),
        None,
    );
    assert!(matches!(result, Err(SessionError::NoRuntime(_))));
}
