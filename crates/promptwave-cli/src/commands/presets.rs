//! Saved prompt presets and master volume.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use promptwave_config::{PromptPreset, SettingsStore};
use promptwave_core::{Prompt, PromptSet};

use super::common::{ParamArgs, load_settings, parse_prompt, settings_store};

#[derive(Args)]
pub struct PresetsArgs {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: PresetsCommand,
}

#[derive(Subcommand)]
enum PresetsCommand {
    /// List saved presets
    List,

    /// Show a preset's prompts and parameters
    Show {
        /// Preset name
        name: String,
    },

    /// Save prompts and parameters under a name
    Save {
        /// Preset name
        name: String,

        /// Prompt as TEXT or TEXT:WEIGHT (repeatable)
        #[arg(short, long = "prompt", required = true, value_parser = parse_prompt)]
        prompts: Vec<Prompt>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Delete a preset
    Delete {
        /// Preset name
        name: String,
    },

    /// Show or set the saved volume (0-1)
    Volume {
        /// New volume
        value: Option<f32>,
    },
}

pub fn run(args: PresetsArgs) -> anyhow::Result<()> {
    let store = settings_store(args.settings);
    let mut settings = load_settings(&store)?;

    match args.command {
        PresetsCommand::List => {
            let names: Vec<_> = settings.preset_names().collect();
            if names.is_empty() {
                println!("No saved presets.");
                println!("Save one with: promptwave presets save NAME -p \"Minimal techno\"");
                return Ok(());
            }
            println!("Saved Presets");
            println!("=============\n");
            for name in names {
                println!("  {name}");
            }
        }

        PresetsCommand::Show { name } => {
            let preset = settings.preset(&name).map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Preset: {name}\n");
            println!("Prompts:");
            for prompt in preset.prompts.iter() {
                println!("  {:<40} {:.2}", prompt.text(), prompt.weight());
            }
            let p = &preset.parameters;
            if !p.is_empty() {
                println!("\nParameters:");
                let fields = [
                    ("bpm", p.tempo_bpm),
                    ("guidance", p.guidance),
                    ("density", p.density),
                    ("brightness", p.brightness),
                ];
                for (key, value) in fields {
                    if let Some(value) = value {
                        println!("  {key:<12} {value}");
                    }
                }
            }
        }

        PresetsCommand::Save {
            name,
            prompts,
            params,
        } => {
            let preset = PromptPreset {
                prompts: PromptSet::new(prompts),
                parameters: params.to_update(),
            };
            settings.set_preset(name.clone(), preset);
            store.save(&settings).map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Saved preset '{name}' to {}", store.path().display());
        }

        PresetsCommand::Delete { name } => {
            settings
                .remove_preset(&name)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            store.save(&settings).map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("Deleted preset '{name}'");
        }

        PresetsCommand::Volume { value } => {
            if let Some(value) = value {
                if !value.is_finite() {
                    anyhow::bail!("volume must be a number between 0 and 1");
                }
                settings.set_volume(value);
                store.save(&settings).map_err(|e| anyhow::anyhow!("{}", e))?;
            }
            println!("Volume: {:.2}", settings.volume);
        }
    }

    Ok(())
}
