//! Notifications published to observers.

use std::time::Duration;

use crate::state::{ActiveEngine, PlaybackState};

/// A state change observers can react to.
///
/// Events are delivered in the order the state actually changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The playback state machine moved.
    PlaybackStateChanged(PlaybackState),
    /// A different generator now supplies audio.
    EngineChanged(ActiveEngine),
    /// The remote content policy rejected a prompt.
    FilteredPrompt {
        /// Rejected prompt text.
        text: String,
        /// Reason given by the service.
        reason: String,
    },
    /// A reconnect attempt was scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Maximum attempts before falling back.
        max: u32,
        /// Backoff before the attempt.
        delay: Duration,
        /// Why the connection was lost.
        reason: String,
    },
    /// Something the user should be told about.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl SessionEvent {
    /// Shorthand for an error event.
    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }
}
