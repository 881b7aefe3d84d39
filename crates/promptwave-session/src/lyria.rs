//! Lyria live-music transport.
//!
//! Speaks the Gemini `BidiGenerateMusic` websocket protocol. The socket is
//! blocking `tungstenite` over `native-tls`, owned by a dedicated worker
//! thread; the async side talks to it through channels only.
//!
//! ```text
//!   RemoteEngine ──Outbound──▶ socket worker ──frames──▶ service
//!   session actor ◀──ServerMessage── socket worker ◀──frames── service
//! ```

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use native_tls::TlsStream;
use promptwave_config::EngineConfig;
use promptwave_core::Prompt;
use serde::Deserialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tungstenite::{Message, WebSocket};

use crate::protocol::{
    GenerationConfig, MusicConnector, MusicSession, PlaybackControl, RemoteLink, ServerMessage,
};
use crate::{Result, SessionError};

/// Websocket endpoint of the live-music service.
pub const LYRIA_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic";

/// Read timeout while the worker polls for outbound messages.
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Read timeout while waiting for `setupComplete`.
const HANDSHAKE_POLL: Duration = Duration::from_millis(250);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Close code reported when the peer sent none.
const NO_STATUS_CODE: u16 = 1005;

type Socket = WebSocket<TlsStream<TcpStream>>;

/// Opens Lyria sessions.
#[derive(Clone)]
pub struct LyriaConnector {
    api_key: String,
    model: String,
    endpoint: String,
    handshake_timeout: Duration,
}

impl std::fmt::Debug for LyriaConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyriaConnector")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

impl LyriaConnector {
    /// Create a connector for `model` (a `models/...` resource name).
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: LYRIA_ENDPOINT.to_string(),
            handshake_timeout,
        }
    }

    /// Build from configuration. `None` without a credential.
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        let key = config.api_key.as_deref().map(str::trim)?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(
            key,
            config.model_resource(),
            config.handshake_timeout(),
        ))
    }

    /// Use a different websocket endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Model resource name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl MusicConnector for LyriaConnector {
    async fn connect(&self) -> Result<RemoteLink> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let model = self.model.clone();
        let timeout = self.handshake_timeout;

        let socket = tokio::task::spawn_blocking(move || handshake(&url, &model, timeout))
            .await
            .map_err(SessionError::transport)??;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("promptwave-ws".to_string())
            .spawn(move || socket_worker(socket, out_rx, in_tx))?;

        tracing::info!(model = %self.model, "remote session connected");
        Ok(RemoteLink {
            session: Box::new(LyriaSession { outbound: out_tx }),
            messages: in_rx,
        })
    }
}

enum Outbound {
    Text {
        text: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Outbound half of a Lyria connection.
pub struct LyriaSession {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl LyriaSession {
    async fn send(&mut self, text: String) -> Result<()> {
        let (ack, accepted) = oneshot::channel();
        self.outbound
            .send(Outbound::Text { text, ack })
            .map_err(|_| SessionError::transport("socket worker has exited"))?;
        accepted
            .await
            .map_err(|_| SessionError::transport("socket worker has exited"))?
    }
}

#[async_trait]
impl MusicSession for LyriaSession {
    async fn set_weighted_prompts(&mut self, prompts: &[Prompt]) -> Result<()> {
        self.send(prompts_message(prompts)).await
    }

    async fn set_config(&mut self, config: &GenerationConfig) -> Result<()> {
        self.send(config_message(config)).await
    }

    async fn control(&mut self, control: PlaybackControl) -> Result<()> {
        self.send(control_message(control)).await
    }

    async fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn open_socket(ws_url: &str, timeout: Duration) -> Result<Socket> {
    let url = url::Url::parse(ws_url).map_err(SessionError::transport)?;
    let host = url
        .host_str()
        .ok_or_else(|| SessionError::transport("endpoint has no host"))?;
    let port = url.port().unwrap_or(443);

    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| SessionError::transport(format!("failed to resolve {host}")))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)?;
    tcp.set_read_timeout(Some(HANDSHAKE_POLL))?;
    tcp.set_write_timeout(Some(WRITE_TIMEOUT))?;
    tcp.set_nodelay(true)?;

    let tls = native_tls::TlsConnector::new()?
        .connect(host, tcp)
        .map_err(SessionError::transport)?;

    let (socket, _response) =
        tungstenite::client::client(ws_url, tls).map_err(SessionError::transport)?;
    Ok(socket)
}

/// Connect, send setup and block until `setupComplete` or the deadline.
fn handshake(ws_url: &str, model: &str, timeout: Duration) -> Result<Socket> {
    let deadline = Instant::now() + timeout;
    let mut socket = open_socket(ws_url, timeout)?;
    socket.send(Message::Text(setup_message(model)))?;

    loop {
        if Instant::now() >= deadline {
            return Err(SessionError::Timeout(timeout));
        }
        let text = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Close(frame)) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                return Err(SessionError::Handshake(format!(
                    "closed during setup: {reason}"
                )));
            }
            Ok(_) => continue,
            Err(tungstenite::Error::Io(ref e)) if is_timeout(e) => continue,
            Err(e) => return Err(e.into()),
        };

        for message in parse_server_message(&text)? {
            match message {
                ServerMessage::SetupComplete => {
                    socket.get_ref().get_ref().set_read_timeout(Some(POLL_INTERVAL))?;
                    return Ok(socket);
                }
                ServerMessage::Error { message } => return Err(SessionError::Handshake(message)),
                other => tracing::debug!(?other, "message before setup complete"),
            }
        }
    }
}

/// Owns the socket until the connection ends or the session is dropped.
fn socket_worker(
    mut socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Text { text, ack }) => {
                    let result = socket.send(Message::Text(text)).map_err(SessionError::from);
                    let failed = result.is_err();
                    let _ = ack.send(result);
                    if failed {
                        return;
                    }
                }
                Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    tracing::debug!("socket worker closed connection");
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let messages = match socket.read() {
            Ok(Message::Text(text)) => decode_frame(&text),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => decode_frame(text),
                Err(_) => {
                    tracing::debug!(len = bytes.len(), "ignoring non-UTF-8 binary frame");
                    Vec::new()
                }
            },
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame.map_or((NO_STATUS_CODE, String::new()), |f| {
                    (u16::from(f.code), f.reason.to_string())
                });
                let _ = inbound.send(ServerMessage::Closed { code, reason });
                return;
            }
            Ok(_) => Vec::new(),
            Err(tungstenite::Error::Io(ref e)) if is_timeout(e) => continue,
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                let _ = inbound.send(ServerMessage::Closed {
                    code: NO_STATUS_CODE,
                    reason: "connection closed".to_string(),
                });
                return;
            }
            Err(e) => {
                let _ = inbound.send(ServerMessage::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        for message in messages {
            if inbound.send(message).is_err() {
                // Session discarded by the actor.
                let _ = socket.close(None);
                let _ = socket.flush();
                return;
            }
        }
    }
}

fn decode_frame(text: &str) -> Vec<ServerMessage> {
    parse_server_message(text).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "dropping undecodable server message");
        Vec::new()
    })
}

pub(crate) fn setup_message(model: &str) -> String {
    serde_json::json!({ "setup": { "model": model } }).to_string()
}

pub(crate) fn prompts_message(prompts: &[Prompt]) -> String {
    let weighted: Vec<_> = prompts
        .iter()
        .map(|p| serde_json::json!({ "text": p.text(), "weight": p.weight() }))
        .collect();
    serde_json::json!({ "clientContent": { "weightedPrompts": weighted } }).to_string()
}

pub(crate) fn config_message(config: &GenerationConfig) -> String {
    serde_json::json!({
        "musicGenerationConfig": {
            "bpm": config.bpm.round() as i64,
            "guidance": config.guidance,
            "density": config.density,
            "brightness": config.brightness,
        }
    })
    .to_string()
}

pub(crate) fn control_message(control: PlaybackControl) -> String {
    serde_json::json!({ "playbackControl": control.as_str() }).to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<WireServerContent>,
    filtered_prompt: Option<WireFilteredPrompt>,
    warning: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireServerContent {
    #[serde(default)]
    audio_chunks: Vec<WireAudioChunk>,
}

#[derive(Debug, Deserialize)]
struct WireAudioChunk {
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFilteredPrompt {
    #[serde(default)]
    text: String,
    #[serde(default)]
    filtered_reason: String,
}

fn value_text(value: &serde_json::Value) -> String {
    value
        .as_str()
        .or_else(|| value.get("message").and_then(serde_json::Value::as_str))
        .map_or_else(|| value.to_string(), str::to_string)
}

/// Decode one inbound JSON frame. A frame may carry several messages.
pub fn parse_server_message(text: &str) -> Result<Vec<ServerMessage>> {
    let wire: WireMessage = serde_json::from_str(text)?;
    let mut out = Vec::new();

    if wire.setup_complete.is_some() {
        out.push(ServerMessage::SetupComplete);
    }
    if let Some(filtered) = wire.filtered_prompt {
        out.push(ServerMessage::FilteredPrompt {
            text: filtered.text,
            reason: filtered.filtered_reason,
        });
    }
    if let Some(content) = wire.server_content {
        let payloads: Vec<String> = content
            .audio_chunks
            .into_iter()
            .map(|c| c.data)
            .filter(|d| !d.is_empty())
            .collect();
        if !payloads.is_empty() {
            out.push(ServerMessage::AudioChunks(payloads));
        }
    }
    if let Some(warning) = wire.warning {
        out.push(ServerMessage::Warning {
            message: value_text(&warning),
        });
    }
    if let Some(error) = wire.error {
        out.push(ServerMessage::Error {
            message: value_text(&error),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn json(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn outbound_shapes() {
        assert_eq!(
            json(&setup_message("models/lyria-realtime-exp")),
            serde_json::json!({ "setup": { "model": "models/lyria-realtime-exp" } })
        );

        let prompts = [
            Prompt::new("Bossa Nova", 1.0).unwrap(),
            Prompt::new("Chill", 0.5).unwrap(),
        ];
        let v = json(&prompts_message(&prompts));
        let weighted = &v["clientContent"]["weightedPrompts"];
        assert_eq!(weighted[0]["text"], "Bossa Nova");
        assert_eq!(weighted[1]["weight"], 0.5);

        let v = json(&config_message(&GenerationConfig {
            bpm: 119.6,
            guidance: 4.0,
            density: 0.5,
            brightness: 0.25,
        }));
        assert_eq!(v["musicGenerationConfig"]["bpm"], 120);
        assert_eq!(v["musicGenerationConfig"]["brightness"], 0.25);

        assert_eq!(
            json(&control_message(PlaybackControl::Pause)),
            serde_json::json!({ "playbackControl": "PAUSE" })
        );
    }

    #[test]
    fn parses_setup_complete() {
        assert_eq!(
            parse_server_message(r#"{"setupComplete":{}}"#).unwrap(),
            vec![ServerMessage::SetupComplete]
        );
    }

    #[test]
    fn parses_audio_chunks_in_order() {
        let msg = r#"{"serverContent":{"audioChunks":[
            {"data":"AAA=","mimeType":"audio/l16;rate=48000;channels=2"},
            {"data":"BBB="}
        ]}}"#;
        assert_eq!(
            parse_server_message(msg).unwrap(),
            vec![ServerMessage::AudioChunks(vec![
                "AAA=".to_string(),
                "BBB=".to_string()
            ])]
        );
    }

    #[test]
    fn parses_filtered_prompt_and_warning() {
        let msg = r#"{"filteredPrompt":{"text":"Forbidden","filteredReason":"policy"},
                      "warning":"slow down"}"#;
        assert_eq!(
            parse_server_message(msg).unwrap(),
            vec![
                ServerMessage::FilteredPrompt {
                    text: "Forbidden".to_string(),
                    reason: "policy".to_string()
                },
                ServerMessage::Warning {
                    message: "slow down".to_string()
                }
            ]
        );
    }

    #[test]
    fn error_object_uses_its_message() {
        let msg = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        assert_eq!(
            parse_server_message(msg).unwrap(),
            vec![ServerMessage::Error {
                message: "quota exceeded".to_string()
            }]
        );
    }

    #[test]
    fn unknown_fields_are_ignored_and_garbage_fails() {
        assert!(parse_server_message(r#"{"usageMetadata":{}}"#).unwrap().is_empty());
        assert!(parse_server_message("not json").is_err());
    }

    #[test]
    fn connector_requires_credentials() {
        let mut config = EngineConfig::default();
        assert!(LyriaConnector::from_config(&config).is_none());
        config.api_key = Some("  ".to_string());
        assert!(LyriaConnector::from_config(&config).is_none());
        config.api_key = Some("secret".to_string());
        let connector = LyriaConnector::from_config(&config).unwrap();
        assert_eq!(connector.model(), "models/lyria-realtime-exp");
        assert!(!format!("{connector:?}").contains("secret"));
    }
}
