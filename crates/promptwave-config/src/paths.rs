//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/promptwave/`
//! - macOS: `~/Library/Application Support/promptwave/`
//! - Windows: `%APPDATA%\promptwave\`

use std::path::PathBuf;

const APP_NAME: &str = "promptwave";
const CONFIG_FILE: &str = "config.toml";
const SETTINGS_FILE: &str = "settings.toml";

/// Returns the user configuration directory.
///
/// Falls back to the current directory if the platform has none.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the engine configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Default location of the persisted user settings.
pub fn default_settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}
