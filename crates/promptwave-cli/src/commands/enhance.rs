//! Prompt enhancement and suggestions through a text model.

use std::path::Path;

use clap::Args;
use promptwave_config::API_KEY_ENV;
use promptwave_session::{DEFAULT_TEXT_MODEL, GeminiTextCompleter, PromptEnhancer};

use super::common::load_config;

#[derive(Args)]
pub struct EnhanceArgs {
    /// Prompt to rewrite
    #[arg(required_unless_present = "suggest")]
    text: Option<String>,

    /// Suggest this many new prompts instead
    #[arg(long, value_name = "COUNT", conflicts_with = "text")]
    suggest: Option<usize>,

    /// Text model to ask
    #[arg(long, default_value = DEFAULT_TEXT_MODEL)]
    model: String,
}

pub fn run(args: EnhanceArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let Some(api_key) = config.api_key.clone().filter(|_| config.has_credentials()) else {
        anyhow::bail!("No API key configured. Set {API_KEY_ENV} or api_key in the config file.");
    };

    let enhancer = PromptEnhancer::new(GeminiTextCompleter::new(api_key).with_model(args.model));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Some(count) = args.suggest {
        let ideas = runtime.block_on(enhancer.suggest(count));
        if ideas.is_empty() {
            println!("No suggestions available.");
        }
        for idea in ideas {
            println!("{idea}");
        }
    } else if let Some(text) = args.text {
        let enhanced = runtime.block_on(enhancer.enhance(&text));
        println!("{enhanced}");
    }
    Ok(())
}
