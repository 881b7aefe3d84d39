//! Configuration and settings for promptwave.
//!
//! # Features
//!
//! - [`EngineConfig`]: session timing, retry and audio format settings,
//!   loaded from TOML with environment overrides
//! - [`SettingsStore`]: persisted user volume and prompt presets, with the
//!   TOML-backed [`FileSettingsStore`]
//! - [`paths`]: platform config locations
//!
//! # Example
//!
//! ```rust,no_run
//! use promptwave_config::{EngineConfig, FileSettingsStore, SettingsStore};
//!
//! let config = EngineConfig::from_env_and_file(None).unwrap();
//! println!("retries: {}", config.max_retries);
//!
//! let store = FileSettingsStore::at_default_location();
//! let mut settings = store.load().unwrap();
//! settings.set_volume(0.5);
//! store.save(&settings).unwrap();
//! ```

mod config;
mod error;
mod settings;

/// Platform-specific configuration paths.
pub mod paths;

pub use config::{API_KEY_ENV, EngineConfig};
pub use error::{ConfigError, Result};
pub use paths::{default_config_path, default_settings_path, user_config_dir};
pub use settings::{FileSettingsStore, PromptPreset, Settings, SettingsStore};
