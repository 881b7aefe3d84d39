//! Error types for session operations.

use std::time::Duration;

/// Errors raised by the session layer.
///
/// Only [`SessionError::Closed`] reaches callers of
/// [`SessionManager`](crate::SessionManager) operations. Everything else is
/// handled inside the actor (reconnect, fallback) and surfaced as events.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session actor has been destroyed.
    #[error("session is closed")]
    Closed,

    /// No tokio runtime is available to host the session.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// The remote service refused or broke the setup handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A remote operation did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A connect attempt was cancelled.
    #[error("connect attempt cancelled")]
    Cancelled,

    /// The connection to the remote service failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The text completion service answered with something unusable.
    #[error("completion failed: {0}")]
    Completion(String),
}

impl SessionError {
    /// Shorthand for a transport error.
    pub fn transport(message: impl std::fmt::Display) -> Self {
        SessionError::Transport(message.to_string())
    }
}

impl From<tungstenite::Error> for SessionError {
    fn from(e: tungstenite::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

impl From<native_tls::Error> for SessionError {
    fn from(e: native_tls::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
