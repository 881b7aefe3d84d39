//! Engine configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. The API key may also come from the
//! `GEMINI_API_KEY` environment variable, which wins over the file.

use std::path::Path;
use std::time::Duration;

use promptwave_core::ReconnectPolicy;
use promptwave_io::SchedulerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::paths;

/// Environment variable holding the remote service credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Runtime configuration of a promptwave session.
///
/// ## Fields
///
/// | field | default |
/// |---|---|
/// | `api_key` | none (env `GEMINI_API_KEY`) |
/// | `model` | `lyria-realtime-exp` |
/// | `sample_rate` / `channels` | 48000 / 2 |
/// | `max_retries` / `base_delay_ms` | 5 / 1000 |
/// | `lookahead_ms` | 1500 |
/// | `starvation_tolerance_ms` | 100 |
/// | `fade_ms` | 100 |
/// | `fallback_block_ms` | 100 |
/// | `handshake_timeout_ms` | 10000 |
/// | `auto_resume_fallback` | true |
/// | `event_capacity` | 256 |
/// | `initial_volume` | 0.8 |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Remote service credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Live-music model name, with or without the `models/` prefix.
    pub model: String,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Reconnect attempts before switching to the fallback.
    pub max_retries: u32,
    /// First reconnect delay; doubles every attempt.
    pub base_delay_ms: u64,
    /// Buffer scheduled ahead of the device clock before playback.
    pub lookahead_ms: u64,
    /// Lag after which scheduling snaps back to the device clock.
    pub starvation_tolerance_ms: u64,
    /// Fade applied on pause and stop.
    pub fade_ms: u64,
    /// Length of each fallback render block.
    pub fallback_block_ms: u64,
    /// Deadline for connect plus setup handshake.
    pub handshake_timeout_ms: u64,
    /// Keep playing on the fallback once reconnects are exhausted.
    pub auto_resume_fallback: bool,
    /// Event buffer per subscriber.
    pub event_capacity: usize,
    /// Master volume at startup.
    pub initial_volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "lyria-realtime-exp".to_string(),
            sample_rate: 48000,
            channels: 2,
            max_retries: ReconnectPolicy::DEFAULT_MAX_RETRIES,
            base_delay_ms: 1000,
            lookahead_ms: 1500,
            starvation_tolerance_ms: 100,
            fade_ms: 100,
            fallback_block_ms: 100,
            handshake_timeout_ms: 10_000,
            auto_resume_fallback: true,
            event_capacity: 256,
            initial_volume: 0.8,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to a TOML file, creating the parent directory.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Resolve the configuration the way the CLI does.
    ///
    /// An explicit `path` must exist. Without one, the default config file is
    /// used if present. Environment overrides apply last, then the result is
    /// validated.
    pub fn from_env_and_file(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => {
                let default = paths::default_config_path();
                if default.is_file() {
                    Self::load(&default)?
                } else {
                    Self::default()
                }
            }
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "sample_rate",
                format!("{} Hz is outside 8000..=192000", self.sample_rate),
            ));
        }
        if self.channels != 2 {
            return Err(ConfigError::invalid(
                "channels",
                format!("{} channels requested, remote audio is stereo", self.channels),
            ));
        }
        let nonzero: [(&'static str, u64); 4] = [
            ("base_delay_ms", self.base_delay_ms),
            ("lookahead_ms", self.lookahead_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("event_capacity", self.event_capacity as u64),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if !(10..=1000).contains(&self.fallback_block_ms) {
            return Err(ConfigError::invalid(
                "fallback_block_ms",
                format!("{} ms is outside 10..=1000", self.fallback_block_ms),
            ));
        }
        if !self.initial_volume.is_finite() || !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(ConfigError::invalid(
                "initial_volume",
                format!("{} is outside 0..=1", self.initial_volume),
            ));
        }
        Ok(())
    }

    /// Whether a usable credential is present.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Model resource name as the service expects it.
    pub fn model_resource(&self) -> String {
        let model = self.model.trim();
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    /// Backoff policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }

    /// Scheduler timing and payload format.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            lookahead: self.lookahead(),
            starvation_tolerance: Duration::from_millis(self.starvation_tolerance_ms),
            fade: self.fade(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Lookahead as a duration.
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }

    /// Pause/stop fade as a duration.
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    /// Fallback block length as a duration.
    pub fn fallback_block(&self) -> Duration {
        Duration::from_millis(self.fallback_block_ms)
    }

    /// Frames per fallback block.
    pub fn fallback_block_frames(&self) -> usize {
        (u64::from(self.sample_rate) * self.fallback_block_ms / 1000) as usize
    }

    /// Handshake deadline as a duration.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
