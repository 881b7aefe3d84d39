//! Persisted user settings: master volume and named prompt presets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use promptwave_core::{ParameterUpdate, PromptSet};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::paths;

/// A saved combination of prompts and parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptPreset {
    /// Prompts to apply.
    pub prompts: PromptSet,
    /// Parameters to merge; absent fields keep the current value.
    #[serde(default)]
    pub parameters: ParameterUpdate,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master volume in `[0, 1]`.
    pub volume: f32,
    /// Named presets.
    pub presets: BTreeMap<String, PromptPreset>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            presets: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Set the volume, clamped to `[0, 1]`. Non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    /// Look up a preset.
    pub fn preset(&self, name: &str) -> Result<&PromptPreset> {
        self.presets
            .get(name)
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }

    /// Store or replace a preset.
    pub fn set_preset(&mut self, name: impl Into<String>, preset: PromptPreset) {
        self.presets.insert(name.into(), preset);
    }

    /// Remove a preset, returning it.
    pub fn remove_preset(&mut self, name: &str) -> Result<PromptPreset> {
        self.presets
            .remove(name)
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
    }

    /// Preset names in sorted order.
    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

/// Key-value persistence for [`Settings`].
pub trait SettingsStore {
    /// Read settings. A store with nothing saved yields the defaults.
    fn load(&self) -> Result<Settings>;

    /// Persist settings.
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// TOML file backed [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    pub fn at_default_location() -> Self {
        Self::new(paths::default_settings_path())
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::read_file(&self.path, e))?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.set_volume(settings.volume);
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(|e| ConfigError::write_file(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), presets = settings.presets.len(), "settings saved");
        Ok(())
    }
}
