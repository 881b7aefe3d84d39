//! Promptwave Session - the steering engine's runtime.
//!
//! A [`SessionManager`] owns one playback session: it keeps the live remote
//! music stream scheduled gaplessly on an output device, reconnects with
//! exponential backoff when the link drops, and switches for good to the
//! local [`FallbackSynthesizer`](promptwave_synth::FallbackSynthesizer) once
//! reconnects are exhausted.
//!
//! # Architecture
//!
//! ```text
//!                       ┌────────────────────────────────────────┐
//!   SessionManager ───▶ │ SessionActor (one tokio task)          │
//!     (commands)        │   PlaybackState, ReconnectState        │
//!                       │   EngineSlot: Idle | Remote | Fallback │──▶ AudioScheduler ──▶ OutputDevice
//!   MusicConnector ───▶ │   FilteredPromptRegistry               │
//!     (RemoteLink)      └────────────────────────────────────────┘
//!                                 │ EventBus (broadcast)
//!                                 ▼
//!                             observers
//! ```
//!
//! # Core Components
//!
//! - [`SessionManager`] / [`SessionSnapshot`] - public handle and state view
//! - [`EventBus`] - event subscription
//! - [`Engine`] / [`EngineSlot`] - generator abstraction over
//!   [`RemoteEngine`] and [`FallbackEngine`]
//! - [`MusicConnector`] / [`MusicSession`] / [`ServerMessage`] - remote protocol seams
//! - [`LyriaConnector`] - websocket implementation of the remote protocol
//! - [`PromptEnhancer`] / [`TextCompleter`] - prompt rewriting helpers

mod actor;
pub mod bus;
pub mod engine;
pub mod enhance;
pub mod error;
pub mod fallback;
pub mod lyria;
pub mod manager;
pub mod protocol;
pub mod remote;

pub use bus::{EventBus, EventReceiver};
pub use engine::{Engine, EngineSlot};
pub use enhance::{DEFAULT_TEXT_MODEL, GeminiTextCompleter, PromptEnhancer, TextCompleter};
pub use error::{Result, SessionError};
pub use fallback::FallbackEngine;
pub use lyria::{LYRIA_ENDPOINT, LyriaConnector, LyriaSession, parse_server_message};
pub use manager::{SessionManager, SessionSnapshot};
pub use protocol::{
    GenerationConfig, MusicConnector, MusicSession, PlaybackControl, RemoteLink, ServerMessage,
};
pub use remote::RemoteEngine;
