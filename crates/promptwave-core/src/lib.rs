//! Promptwave Core - value types shared by every promptwave crate.
//!
//! This crate holds the data model of the steering engine. It has no I/O and
//! no async code; the session crate owns all behavior.
//!
//! # Core Components
//!
//! ## Prompts
//!
//! - [`Prompt`] - a validated weighted text prompt
//! - [`PromptSet`] - an ordered, wholesale-replaced collection of prompts
//! - [`FilteredPromptRegistry`] - texts rejected by the remote content policy
//!
//! ```rust
//! use promptwave_core::{FilteredPromptRegistry, Prompt, PromptSet};
//!
//! let set = PromptSet::new(vec![
//!     Prompt::new("Minimal techno", 1.0).unwrap(),
//!     Prompt::new("Sitar", 0.0).unwrap(),
//! ]);
//!
//! let registry = FilteredPromptRegistry::new();
//! assert_eq!(set.active(&registry).len(), 1);
//! ```
//!
//! ## Generation parameters
//!
//! - [`ParameterSet`] - tempo, guidance, density and brightness, each clamped
//! - [`ParameterUpdate`] - a partial update merged last-write-wins
//!
//! ## Playback
//!
//! - [`PlaybackState`] / [`ActiveEngine`] - the session state machine's vocabulary
//! - [`ReconnectPolicy`] / [`ReconnectState`] - exponential backoff bookkeeping
//! - [`SessionEvent`] - notifications published to observers

pub mod event;
pub mod params;
pub mod prompt;
pub mod reconnect;
pub mod state;

pub use event::SessionEvent;
pub use params::{
    BRIGHTNESS_RANGE, DENSITY_RANGE, GUIDANCE_RANGE, ParameterChange, ParameterSet,
    ParameterUpdate, TEMPO_RANGE,
};
pub use prompt::{FilteredPromptRegistry, MAX_PROMPT_CHARS, Prompt, PromptSet};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use state::{ActiveEngine, PlaybackState};

/// Errors raised while building value types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PromptError {
    /// Prompt text was empty or whitespace only.
    #[error("prompt text is empty")]
    EmptyText,

    /// Prompt text exceeded [`MAX_PROMPT_CHARS`].
    #[error("prompt text is {len} characters long (max {max})")]
    TextTooLong {
        /// Length of the rejected text in characters.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Prompt weight was negative or not finite.
    #[error("invalid prompt weight {0} (must be finite and >= 0)")]
    InvalidWeight(f32),
}

/// Convenience result type for value construction.
pub type Result<T> = std::result::Result<T, PromptError>;
