//! Promptwave CLI - steer generative music from the terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptwave")]
#[command(author, version, about = "Real-time prompt-steered music", long_about = None)]
struct Cli {
    /// Engine configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session on the speakers
    Live(commands::live::LiveArgs),

    /// Render the local fallback generator to a WAV file
    Render(commands::render::RenderArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),

    /// Rewrite or suggest prompts with a text model
    Enhance(commands::enhance::EnhanceArgs),

    /// Manage saved prompt presets and volume
    Presets(commands::presets::PresetsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Live(args) => commands::live::run(args, config),
        Commands::Render(args) => commands::render::run(args, config),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Enhance(args) => commands::enhance::run(args, config),
        Commands::Presets(args) => commands::presets::run(args),
    }
}
