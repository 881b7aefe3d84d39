//! Shared CLI helpers used across multiple commands.

use std::path::{Path, PathBuf};

use clap::Args;
use promptwave_config::{EngineConfig, FileSettingsStore, Settings, SettingsStore};
use promptwave_core::{ParameterUpdate, Prompt, PromptSet};

/// Parse `text` or `text:weight` for clap's `value_parser`.
///
/// A suffix that is not a number stays part of the text, so `"lo-fi: dusty"`
/// is a single prompt with weight 1.
pub fn parse_prompt(s: &str) -> Result<Prompt, String> {
    let (text, weight) = match s.rsplit_once(':') {
        Some((text, weight)) => match weight.trim().parse::<f32>() {
            Ok(weight) => (text, weight),
            Err(_) => (s, 1.0),
        },
        None => (s, 1.0),
    };
    Prompt::new(text, weight).map_err(|e| format!("invalid prompt '{s}': {e}"))
}

/// Parse a comma-separated prompt list such as `"funk:1, ska:0.5"`.
pub fn parse_prompt_list(s: &str) -> Result<PromptSet, String> {
    let prompts = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_prompt)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PromptSet::new(prompts))
}

/// Load the engine configuration, honoring `GEMINI_API_KEY`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    EngineConfig::from_env_and_file(path).map_err(|e| anyhow::anyhow!("{}", e))
}

/// Open the settings store at `path` or the default location.
pub fn settings_store(path: Option<PathBuf>) -> FileSettingsStore {
    path.map_or_else(FileSettingsStore::at_default_location, FileSettingsStore::new)
}

/// Load settings, mapping the error for the CLI.
pub fn load_settings(store: &FileSettingsStore) -> anyhow::Result<Settings> {
    store.load().map_err(|e| anyhow::anyhow!("{}", e))
}

/// Generation parameters shared by `live` and `render`.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// Tempo in BPM (60-200)
    #[arg(long)]
    pub bpm: Option<f32>,

    /// Prompt adherence (0-6)
    #[arg(long)]
    pub guidance: Option<f32>,

    /// Note density (0-1)
    #[arg(long)]
    pub density: Option<f32>,

    /// Tonal brightness (0-1)
    #[arg(long)]
    pub brightness: Option<f32>,
}

impl ParamArgs {
    /// The flags as a partial update.
    pub fn to_update(&self) -> ParameterUpdate {
        ParameterUpdate {
            tempo_bpm: self.bpm,
            guidance: self.guidance,
            density: self.density,
            brightness: self.brightness,
        }
    }
}

/// Prompt selection shared by `live` and `render`.
#[derive(Args, Debug, Clone, Default)]
pub struct PromptArgs {
    /// Prompt as TEXT or TEXT:WEIGHT (repeatable)
    #[arg(short, long = "prompt", value_parser = parse_prompt)]
    pub prompts: Vec<Prompt>,

    /// Start from a saved preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Settings file holding presets
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl PromptArgs {
    /// Combine the preset (if any) with explicit flags.
    ///
    /// Explicit prompts replace the preset's prompts; explicit parameters
    /// override the preset's parameters field by field.
    pub fn resolve(&self, params: &ParamArgs) -> anyhow::Result<(PromptSet, ParameterUpdate)> {
        let (mut prompts, mut update) = match &self.preset {
            Some(name) => {
                let settings = load_settings(&settings_store(self.settings.clone()))?;
                let preset = settings.preset(name).map_err(|e| {
                    anyhow::anyhow!("{e}. Use 'promptwave presets list' to see saved presets.")
                })?;
                (preset.prompts.clone(), preset.parameters)
            }
            None => (PromptSet::default(), ParameterUpdate::default()),
        };

        if !self.prompts.is_empty() {
            prompts = PromptSet::new(self.prompts.clone());
        }
        let flags = params.to_update();
        update.tempo_bpm = flags.tempo_bpm.or(update.tempo_bpm);
        update.guidance = flags.guidance.or(update.guidance);
        update.density = flags.density.or(update.density);
        update.brightness = flags.brightness.or(update.brightness);

        Ok((prompts, update))
    }
}
