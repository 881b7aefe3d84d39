//! Interactive live session.
//!
//! Reads commands from stdin while the session streams to the speakers.
//! Events are printed as they arrive; Ctrl+C or `quit` ends the session and
//! persists the volume.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use promptwave_config::{FileSettingsStore, SettingsStore};
use promptwave_core::{ParameterUpdate, PromptSet, SessionEvent};
use promptwave_io::{CpalOutput, OutputConfig};
use promptwave_session::{
    EventReceiver, LyriaConnector, MusicConnector, SessionManager, SessionSnapshot,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use super::common::{
    ParamArgs, PromptArgs, load_config, load_settings, parse_prompt_list, settings_store,
};

#[derive(Args)]
pub struct LiveArgs {
    #[command(flatten)]
    prompts: PromptArgs,

    #[command(flatten)]
    params: ParamArgs,

    /// Output device (partial name match)
    #[arg(short, long)]
    device: Option<String>,

    /// Buffer size in frames
    #[arg(long)]
    buffer_size: Option<u32>,

    /// Skip the remote service and use the local generator only
    #[arg(long)]
    offline: bool,

    /// Wait for `play` instead of starting immediately
    #[arg(long)]
    paused: bool,
}

/// A line typed at the live prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveCommand {
    Play,
    Pause,
    Stop,
    Status,
    Help,
    Quit,
    Prompts(PromptSet),
    Preset(String),
    Params(ParameterUpdate),
    Volume(f32),
}

fn parse_number(key: &str, value: &str) -> Result<f32, String> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{key} needs a number, got '{}'", value.trim()))
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_live_command(line: &str) -> Result<Option<LiveCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word.to_lowercase().as_str() {
        "play" | "p" => LiveCommand::Play,
        "pause" => LiveCommand::Pause,
        "stop" | "s" => LiveCommand::Stop,
        "status" => LiveCommand::Status,
        "help" | "?" => LiveCommand::Help,
        "quit" | "exit" | "q" => LiveCommand::Quit,
        "prompts" | "prompt" => {
            if rest.is_empty() {
                return Err("prompts needs TEXT[:WEIGHT], ...".to_string());
            }
            LiveCommand::Prompts(parse_prompt_list(rest)?)
        }
        "preset" => {
            if rest.is_empty() {
                return Err("preset needs a name".to_string());
            }
            LiveCommand::Preset(rest.to_string())
        }
        "bpm" | "tempo" => LiveCommand::Params(ParameterUpdate::tempo(parse_number(word, rest)?)),
        "guidance" => LiveCommand::Params(ParameterUpdate {
            guidance: Some(parse_number(word, rest)?),
            ..Default::default()
        }),
        "density" => LiveCommand::Params(ParameterUpdate {
            density: Some(parse_number(word, rest)?),
            ..Default::default()
        }),
        "brightness" => LiveCommand::Params(ParameterUpdate {
            brightness: Some(parse_number(word, rest)?),
            ..Default::default()
        }),
        "volume" | "vol" => LiveCommand::Volume(parse_number(word, rest)?),
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("Commands:");
    println!("  play | pause | stop         transport");
    println!("  prompts TEXT[:W], ...       replace the prompts");
    println!("  preset NAME                 load a saved preset");
    println!("  bpm N | guidance N          60-200 | 0-6");
    println!("  density N | brightness N    0-1");
    println!("  volume N                    0-1");
    println!("  status | help | quit");
}

fn print_status(snapshot: &SessionSnapshot) {
    let p = &snapshot.parameters;
    println!(
        "{} on {} | {:.0} BPM, guidance {:.1}, density {:.2}, brightness {:.2} | volume {:.2}",
        snapshot.playback,
        snapshot.engine,
        p.tempo_bpm(),
        p.guidance(),
        p.density(),
        p.brightness(),
        snapshot.volume
    );
    for prompt in snapshot.prompts.iter() {
        let mark = if snapshot.filtered.iter().any(|t| t == prompt.text()) {
            " [filtered]"
        } else {
            ""
        };
        println!("  {:<40} {:.2}{}", prompt.text(), prompt.weight(), mark);
    }
    if snapshot.is_reconnecting {
        println!("  reconnecting (attempt {})", snapshot.retry_count);
    }
    if snapshot.fallback_locked {
        println!("  remote service unavailable, local generator only");
    }
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::PlaybackStateChanged(state) => format!("[{state}]"),
        SessionEvent::EngineChanged(engine) => format!("[engine: {engine}]"),
        SessionEvent::FilteredPrompt { text, reason } => {
            format!("[filtered] '{text}': {reason}")
        }
        SessionEvent::Reconnecting {
            attempt,
            max,
            delay,
            reason,
        } => format!(
            "[reconnecting {attempt}/{max} in {:.0}s] {reason}",
            delay.as_secs_f32()
        ),
        SessionEvent::Error { message } => format!("[error] {message}"),
    }
}

async fn print_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", describe(&event)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<LiveCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_live_command(&line) {
                Ok(Some(command)) => {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(message) => eprintln!("{message}"),
            }
        }
        let _ = tx.send(LiveCommand::Quit);
    });
}

pub fn run(args: LiveArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    let store = settings_store(args.prompts.settings.clone());
    let settings = load_settings(&store)?;
    config.initial_volume = settings.volume;

    let (prompts, update) = args.prompts.resolve(&args.params)?;

    let output = CpalOutput::open(&OutputConfig {
        sample_rate: config.sample_rate,
        channels: config.channels,
        buffer_size: args.buffer_size,
        device_name: args.device.clone(),
        initial_gain: config.initial_volume,
    })?;

    let connector: Option<Arc<dyn MusicConnector>> = if args.offline {
        None
    } else {
        LyriaConnector::from_config(&config).map(|c| Arc::new(c) as Arc<dyn MusicConnector>)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        let _ = ctrlc_tx.send(LiveCommand::Quit);
    })?;

    let paused = args.paused;
    let store_ref = &store;
    let volume = runtime.block_on(async move {
        let (manager, events) = SessionManager::init(config, Box::new(output), connector)?;
        tokio::spawn(print_events(events));

        let has_prompts = !prompts.is_empty();
        if has_prompts {
            manager.set_prompts(prompts).await?;
        }
        if !update.is_empty() {
            manager.set_parameters(update).await?;
        }
        if has_prompts && !paused {
            manager.play().await?;
        }

        println!("Type 'help' for commands, Ctrl+C to quit.");
        spawn_stdin_reader(tx);
        drive(&manager, store_ref, rx).await?;

        let last = manager.destroy().await?;
        anyhow::Ok(last.volume)
    })?;

    let mut settings = load_settings(&store)?;
    settings.set_volume(volume);
    store.save(&settings).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(())
}

async fn drive(
    manager: &SessionManager,
    store: &FileSettingsStore,
    mut rx: mpsc::UnboundedReceiver<LiveCommand>,
) -> anyhow::Result<()> {
    while let Some(command) = rx.recv().await {
        match command {
            LiveCommand::Play => {
                manager.play().await?;
            }
            LiveCommand::Pause => {
                manager.pause().await?;
            }
            LiveCommand::Stop => {
                manager.stop().await?;
            }
            LiveCommand::Status => print_status(&manager.snapshot()),
            LiveCommand::Help => print_help(),
            LiveCommand::Quit => break,
            LiveCommand::Prompts(prompts) => {
                manager.set_prompts(prompts).await?;
            }
            LiveCommand::Preset(name) => {
                let settings = load_settings(store)?;
                match settings.preset(&name) {
                    Ok(preset) => {
                        manager.set_prompts(preset.prompts.clone()).await?;
                        if !preset.parameters.is_empty() {
                            manager.set_parameters(preset.parameters).await?;
                        }
                        println!("Loaded preset '{name}'");
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            LiveCommand::Params(update) => {
                manager.set_parameters(update).await?;
            }
            LiveCommand::Volume(volume) => {
                let snapshot = manager.set_volume(volume).await?;
                println!("Volume: {:.2}", snapshot.volume);
            }
        }
    }
    Ok(())
}
